//! Probe Command
//!
//! Report which providers the router could use right now.

use serde_json::json;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, runtime};
use crate::config::mask_key;
use crate::types::Result;

pub fn run(format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let router = ctx.router();
    let caps = runtime()?.block_on(router.capabilities());
    let env = ctx.environment;
    let creds = &ctx.credentials;

    if format == "json" {
        let report = json!({
            "local": {
                "supported": env.local_cli_supported,
                "enabled": env.local_mode_enabled,
                "tools": caps,
                "selected": caps.pick(ctx.config.local.preferred_tool),
            },
            "primary": creds.primary.is_some(),
            "secondary": creds.secondary.is_some(),
            "research": creds.research.is_some(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let output = Output::new();
    let mark = |ok: bool| if ok { "✓" } else { "✗" };

    output.section("Local CLI");
    println!("  Platform support: {}", mark(env.local_cli_supported));
    println!("  Enabled:          {}", mark(env.local_mode_enabled));
    println!("  claude:           {}", mark(caps.claude));
    println!("  gemini:           {}", mark(caps.gemini));

    output.section("Cloud");
    let key = |secret: Option<&secrecy::SecretString>| {
        secret.map(mask_key).unwrap_or_else(|| "(not set)".to_string())
    };
    println!(
        "  Primary:   {} ({})",
        key(creds.primary.as_ref().map(|c| &c.api_key)),
        ctx.config.primary.model
    );
    println!(
        "  Secondary: {} ({})",
        key(creds.secondary.as_ref().map(|c| &c.api_key)),
        ctx.config.secondary.model
    );
    println!(
        "  Research:  {} ({})",
        key(creds.research.as_ref().map(|c| &c.api_key)),
        ctx.config.research.model
    );

    println!();
    if env.allows_local() && caps.any() {
        output.success("Text requests go to the local CLI first");
    } else if creds.has_cloud() {
        output.info("Requests go to the cloud providers");
    } else {
        output.warning("No provider available. Enable local mode or set an API key.");
    }
    Ok(())
}

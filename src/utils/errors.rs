//! User-Friendly Error Formatting
//!
//! Provides user-friendly error messages with troubleshooting hints
//! for common startup failures.

use std::fmt::Write;

/// Format error for user consumption
///
/// Takes technical error and produces user-friendly message with
/// troubleshooting steps and context.
pub fn format_user_error(error: &anyhow::Error) -> String {
    let mut output = String::new();

    // Header
    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "╔════════════════════════════════════════════════════════════╗"
    )
    .ok();
    writeln!(
        &mut output,
        "║                     ERROR                                  ║"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();
    writeln!(&mut output).ok();

    // Match against the whole context chain
    let chain = format!("{:#}", error).to_lowercase();

    if chain.contains("pointer backend") {
        format_backend_error(&mut output);
    } else if chain.contains("bind") || chain.contains("listen address") {
        format_network_error(&mut output);
    } else if chain.contains("config") {
        format_config_error(&mut output);
    } else {
        format_generic_error(&mut output, &error.to_string());
    }

    // Technical details
    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Technical Details:").ok();
    writeln!(&mut output).ok();
    writeln!(&mut output, "{:#}", error).ok();
    writeln!(&mut output).ok();

    // Footer with help
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Need Help?").ok();
    writeln!(
        &mut output,
        "  - Run with --verbose for detailed logs: airmouse-server -vvv"
    )
    .ok();
    writeln!(
        &mut output,
        "  - Write logs to a file: airmouse-server --log-file airmouse.log"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();

    output
}

fn format_backend_error(output: &mut String) {
    writeln!(output, "Pointer Backend Error").ok();
    writeln!(output).ok();
    writeln!(output, "Could not set up pointer control.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Unknown backend name").ok();
    writeln!(output, "     → Supported: 'log', 'null'").ok();
    writeln!(output, "     → Set in config.toml: [input] backend = 'log'").ok();
}

fn format_network_error(output: &mut String) {
    writeln!(output, "Network Binding Error").ok();
    writeln!(output).ok();
    writeln!(
        output,
        "Could not bind to network address for device connections."
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Port 8765 already in use").ok();
    writeln!(output, "     → Check: sudo ss -tlnp | grep 8765").ok();
    writeln!(output, "     → Kill other process or use different port").ok();
    writeln!(output, "     → Or run with: airmouse-server --port 8766").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Permission denied (port < 1024)").ok();
    writeln!(output, "     → Use port >= 1024").ok();
    writeln!(output).ok();
    writeln!(output, "  3. Invalid listen address").ok();
    writeln!(output, "     → Check config.toml: listen_addr format").ok();
    writeln!(output, "     → Should be: 'IP:PORT' like '0.0.0.0:8765'").ok();
}

fn format_config_error(output: &mut String) {
    writeln!(output, "Configuration Error").ok();
    writeln!(output).ok();
    writeln!(output, "Problem with configuration file.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Configuration file not found").ok();
    writeln!(
        output,
        "     → Specify: airmouse-server -c /path/to/config.toml"
    )
    .ok();
    writeln!(
        output,
        "     → Without -c the built-in defaults are used"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  2. Invalid TOML syntax").ok();
    writeln!(output, "     → Check for typos, missing quotes, etc.").ok();
    writeln!(output).ok();
    writeln!(output, "  3. Out-of-range values").ok();
    writeln!(output, "     → Gains and thresholds must be non-negative").ok();
    writeln!(
        output,
        "     → camera.working_width must fit a patch plus its search window"
    )
    .ok();
}

fn format_generic_error(output: &mut String, error: &str) {
    writeln!(output, "Server Error").ok();
    writeln!(output).ok();
    writeln!(output, "An error occurred while running the server.").ok();
    writeln!(output).ok();
    writeln!(output, "Error: {}", error).ok();
}

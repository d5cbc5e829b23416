use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // Any argument at all gets the help text
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Only variables that can never hold a secret. WPG_WEBHOOK_SECRET and WPG_INDEXER_API_KEY are left out.
    const DISPLAY_ENVS: [&str; 15] = [
        "RUST_LOG",
        "WPG_HOST",
        "WPG_PORT",
        "WPG_DATABASE_URL",
        "WPG_USE_X_FORWARDED_FOR",
        "WPG_INVOICE_TTL",
        "WPG_CLOCK_SKEW_GUARD",
        "WPG_AMOUNT_TOLERANCE",
        "WPG_POLL_BUDGET_MS",
        "WPG_MATCHING_KEY_ATTEMPTS",
        "WPG_INDEXER_URL",
        "WPG_INDEXER_PAGE_SIZE",
        "WPG_INDEXER_MAX_PAGES",
        "WPG_PAYMENT_MINT",
        "WPG_TOKEN_DECIMALS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}

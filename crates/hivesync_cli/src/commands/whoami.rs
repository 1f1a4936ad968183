//! Whoami command implementation.

use hivesync_sync_engine::{AuthClient, HttpAuthClient, SyncConfig};

/// Runs the whoami command.
pub fn run(server: &str, token: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = HttpAuthClient::new(&SyncConfig::new(server))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    match runtime.block_on(client.current_user(token))? {
        Some(user) => {
            println!("{} <{}>", user.name, user.email);
            if !user.roles.is_empty() {
                println!("Roles: {}", user.roles.join(", "));
            }
            println!(
                "Two-factor: {}",
                if user.twofa_enabled { "on" } else { "off" }
            );
        }
        None => println!("Not signed in"),
    }
    Ok(())
}

use serde_json::json;
use tplink_acl_core::RouterClient;
use tracing::debug;

use crate::cli::LedState;
use crate::utils::{exit_with_error, print_json};

/// Log in, exiting on failure.
async fn connect(client: &RouterClient) {
    debug!(host = client.host(), "connecting");
    if let Err(e) = client.connect().await {
        exit_with_error(&format!("Could not log in to {}", client.host()), &e);
    }
}

/// Handle the status command.
pub async fn handle_status(client: &RouterClient) {
    connect(client).await;
    match client.get_logged_in_status().await {
        Ok(logged_in) => print_json(&json!({
            "host": client.host(),
            "logged_in": logged_in,
        })),
        Err(e) => exit_with_error("Status check failed", &e),
    }
}

/// Handle the blocked command.
pub async fn handle_blocked(client: &RouterClient) {
    connect(client).await;
    match client.get_blocked_devices().await {
        Ok(macs) => {
            debug!(count = macs.len(), "blocked devices");
            print_json(&json!(macs));
        }
        Err(e) => exit_with_error("Could not load blocked devices", &e),
    }
}

/// Handle the connected command.
pub async fn handle_connected(client: &RouterClient) {
    connect(client).await;
    match client.get_connected_devices().await {
        Ok(devices) => {
            debug!(count = devices.len(), "connected devices");
            print_json(&serde_json::to_value(&devices).unwrap_or_default());
        }
        Err(e) => exit_with_error("Could not load connected devices", &e),
    }
}

/// Handle the block command.
pub async fn handle_block(client: &RouterClient, mac: &str) {
    connect(client).await;
    match client.block_device(mac).await {
        Ok(()) => print_json(&json!({"mac": mac, "blocked": true})),
        Err(e) => exit_with_error(&format!("Could not block {}", mac), &e),
    }
}

/// Handle the unblock command.
///
/// Unblocking a device that is not blocked is not an error; the output
/// reports whether anything was removed.
pub async fn handle_unblock(client: &RouterClient, mac: &str) {
    connect(client).await;
    match client.unblock_device(mac).await {
        Ok(removed) => print_json(&json!({"mac": mac, "removed": removed})),
        Err(e) => exit_with_error(&format!("Could not unblock {}", mac), &e),
    }
}

/// Handle the led command.
pub async fn handle_led(client: &RouterClient, state: Option<LedState>) {
    connect(client).await;

    if let Some(state) = state
        && let Err(e) = client.set_led_status(state.is_on()).await
    {
        exit_with_error("Could not change LED state", &e);
    }

    match client.get_led_status().await {
        Ok(on) => print_json(&json!({"led": if on { "on" } else { "off" }})),
        Err(e) => exit_with_error("Could not read LED state", &e),
    }
}

/// Handle the logout command.
pub async fn handle_logout(client: &RouterClient) {
    connect(client).await;
    match client.logout().await {
        Ok(accepted) => print_json(&json!({"logged_out": accepted})),
        Err(e) => exit_with_error("Logout failed", &e),
    }
}

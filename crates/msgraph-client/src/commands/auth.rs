//! Authentication commands.

use colored::Colorize;
use msgraph_core::OutputFormat;
use msgraph_services::identity::DeviceCodeInfo;
use msgraph_services::{AuthStatus, AuthenticationResult};
use serde_json::json;

use super::{success, with_spinner};
use crate::context::AppContext;
use crate::error::ClientResult;

/// Signs in with the device code flow, or the client credentials flow.
pub async fn login(ctx: &AppContext, client_credentials: bool) -> ClientResult<()> {
    if client_credentials {
        let result = with_spinner(
            "Authenticating with client credentials...",
            Some("Authentication failed."),
            ctx.identity().login_with_client_credentials(),
        )
        .await?;
        success("Successfully authenticated with client credentials.");
        print_expiry(ctx, &result);
        return Ok(());
    }

    println!("{}", "Starting device code authentication...".blue());
    println!();
    let prompt = |info: &DeviceCodeInfo| {
        println!("{}", device_code_prompt(info).bold());
        println!("{}", "Waiting for sign-in to complete...".dimmed());
    };
    let result = ctx.identity().login_with_device_code(&prompt).await?;

    println!();
    let username = result
        .account
        .as_ref()
        .map(|a| a.username.as_str())
        .unwrap_or("unknown user");
    success(&format!("Successfully logged in as {}.", username));
    print_expiry(ctx, &result);
    Ok(())
}

/// Clears the token cache.
pub fn logout(ctx: &AppContext) -> ClientResult<()> {
    ctx.identity().logout()?;
    success("Successfully logged out. Token cache cleared.");
    Ok(())
}

/// Shows whether a token can be obtained without signing in.
pub async fn status(ctx: &AppContext) -> ClientResult<()> {
    let status = ctx.identity().status().await;

    if ctx.format() == OutputFormat::Json {
        let value = json!({
            "authenticated": status.authenticated,
            "account": status.account,
            "expiresOn": status.expires_on.map(|t| t.to_rfc3339()),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let mut lines = status_lines(&status).into_iter();
    if let Some(headline) = lines.next() {
        if status.authenticated {
            println!("{}", headline.green());
        } else {
            println!("{}", headline.yellow());
        }
    }
    for line in lines {
        if status.authenticated {
            println!("{}", line);
        } else {
            println!("{}", line.dimmed());
        }
    }
    Ok(())
}

fn print_expiry(ctx: &AppContext, result: &AuthenticationResult) {
    if ctx.verbose() {
        println!(
            "{}",
            format!("  Token expires: {}", result.expires_on.to_rfc3339()).dimmed()
        );
    }
}

fn device_code_prompt(info: &DeviceCodeInfo) -> String {
    if info.message.trim().is_empty() {
        format!(
            "To sign in, open {} and enter the code {}",
            info.verification_uri, info.user_code
        )
    } else {
        info.message.clone()
    }
}

fn status_lines(status: &AuthStatus) -> Vec<String> {
    let mut lines = Vec::new();
    if status.authenticated {
        lines.push("Authenticated".to_string());
        if let Some(account) = &status.account {
            lines.push(format!("  User: {}", account.username));
            lines.push(format!("  Name: {}", account.name.as_deref().unwrap_or("N/A")));
            lines.push(format!("  Tenant: {}", account.tenant_id));
        }
        if let Some(expires_on) = status.expires_on {
            lines.push(format!("  Token expires: {}", expires_on.to_rfc3339()));
        }
    } else {
        lines.push("Not authenticated".to_string());
        if let Some(account) = &status.account {
            lines.push(format!(
                "  Last known account: {} (token expired)",
                account.username
            ));
        }
        lines.push("  Run \"d-msgraph auth login\" to authenticate.".to_string());
    }
    lines
}

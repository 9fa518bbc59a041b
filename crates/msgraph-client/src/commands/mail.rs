//! Mail commands.

use msgraph_core::BodyType;
use msgraph_services::ListMessagesOptions;

use super::{print_count, print_empty, success, with_spinner};
use crate::cli::{MailListArgs, MailSendArgs, split_addresses};
use crate::context::AppContext;
use crate::error::ClientResult;

pub async fn list(ctx: &AppContext, args: MailListArgs) -> ClientResult<()> {
    let options = ListMessagesOptions {
        top: Some(args.top),
        since: args.since,
        filter: args.filter,
        search: args.search,
        folder: args.folder,
    };
    let messages = with_spinner(
        "Fetching messages...",
        None,
        ctx.mail().list_messages(&options),
    )
    .await?;

    if messages.is_empty() {
        print_empty(ctx.format(), "No messages found.");
        return Ok(());
    }
    println!("{}", ctx.formatter().mail_list(&messages, ctx.format())?);
    print_count(ctx.format(), messages.len(), "message");
    Ok(())
}

pub async fn read(ctx: &AppContext, message_id: &str) -> ClientResult<()> {
    let message = with_spinner(
        "Fetching message...",
        None,
        ctx.mail().read_message(message_id),
    )
    .await?;
    println!("{}", ctx.formatter().mail_detail(&message, ctx.format())?);
    Ok(())
}

pub async fn send(ctx: &AppContext, args: MailSendArgs) -> ClientResult<()> {
    let to = split_addresses(&args.to);
    let content_type = if args.html {
        BodyType::Html
    } else {
        BodyType::Text
    };

    with_spinner(
        "Sending message...",
        Some("Failed to send message."),
        ctx.mail()
            .send_message(&to, &args.subject, &args.body, content_type),
    )
    .await?;
    success("Message sent successfully.");
    Ok(())
}

//! Command handlers for deskctl.

use anyhow::{Context, Result};
use console::style;
use desk_common::rpc::IngestTicket;

use crate::client::DeskdClient;

pub async fn health(client: &DeskdClient) -> Result<()> {
    let health = client.health().await?;
    println!("{} deskd v{}", style("●").green(), health.version);
    println!("  Status:            {}", health.status);
    println!("  Uptime:            {}s", health.uptime_seconds);
    println!("  Pending ingestion: {}", health.tickets_pending_ingestion);
    println!("  Awaiting approval: {}", health.tickets_awaiting_approval);
    Ok(())
}

pub async fn ingest(client: &DeskdClient, file: &str) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read ticket file {}", file))?;
    let tickets: Vec<IngestTicket> =
        serde_json::from_str(&raw).context("ticket file is not a valid JSON ticket array")?;

    let response = client.ingest(tickets).await?;
    println!(
        "{} Ingested {} tickets ({} pending)",
        style("✓").green(),
        response.ingested,
        response.total_pending
    );
    Ok(())
}

pub async fn process_next(client: &DeskdClient) -> Result<()> {
    let response = client.process_next().await?;
    match response.status.as_str() {
        "success" => {
            println!("{} {}", style("✓").green(), response.message);
            if let Some(ticket) = response.ticket {
                println!("  Ticket:  {} ({})", ticket.title, ticket.ticket_id);
                if let Some(answer) = ticket.candidate_answer {
                    println!("  Answer:  {}", answer);
                }
            }
        }
        "sla_failed" => println!("{} {}", style("✗").red(), response.message),
        _ => println!("{} {}", style("-").dim(), response.message),
    }
    Ok(())
}

pub async fn timeline(client: &DeskdClient) -> Result<()> {
    let response = client.timeline().await?;
    if response.timeline.is_empty() {
        println!("No tickets processed yet.");
        return Ok(());
    }

    for entry in response.timeline {
        println!(
            "{} [{}] {} {}",
            style(format!("#{}", entry.ticket_id)).bold(),
            status_styled(&entry.status),
            entry.title,
            style(entry.created_at.format("%Y-%m-%d %H:%M:%S").to_string()).dim()
        );
        for step in &entry.steps {
            println!("    {}", step);
        }
        if let Some(tech) = &entry.assigned_technician {
            println!(
                "    {} {} ({}) <{}>",
                style("→").cyan(),
                tech.name,
                tech.specialization,
                tech.email
            );
        }
        if let Some(key) = &entry.external_issue_key {
            println!("    External issue: {}", key);
        }
    }
    Ok(())
}

pub async fn pending(client: &DeskdClient) -> Result<()> {
    let response = client.pending_approval().await?;
    if response.pending_tickets.is_empty() {
        println!("No tickets awaiting approval.");
        return Ok(());
    }

    for ticket in response.pending_tickets {
        println!(
            "{} [{}] {}",
            style(format!("#{}", ticket.ticket_id)).bold(),
            ticket.priority,
            ticket.title
        );
        if let Some(answer) = &ticket.candidate_answer {
            println!("    Candidate answer: {}", answer);
        }
    }
    Ok(())
}

pub async fn resolve(client: &DeskdClient, ticket_id: i64, approved: bool) -> Result<()> {
    let response = client.resolve(ticket_id, approved).await?;
    let mark = if approved {
        style("✓").green()
    } else {
        style("↻").yellow()
    };
    println!("{} {}", mark, response.message);
    Ok(())
}

pub async fn queues(client: &DeskdClient) -> Result<()> {
    let stats = client.queues().await?;
    println!("Lane      Depth  Credits");
    println!("high      {:>5}  {:>7}", stats.high_depth, stats.high_credits);
    println!(
        "medium    {:>5}  {:>7}",
        stats.medium_depth, stats.medium_credits
    );
    println!("low       {:>5}  {:>7}", stats.low_depth, stats.low_credits);
    Ok(())
}

fn status_styled(status: &str) -> console::StyledObject<String> {
    let status = status.to_string();
    match status.as_str() {
        "assigned" | "approved" => style(status).green(),
        "sla_failed" => style(status).red(),
        "pending_approval" => style(status).yellow(),
        _ => style(status).dim(),
    }
}

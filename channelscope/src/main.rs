//! channelscope - Telegram channel engagement analytics CLI
//!
//! Analyze a channel, compare two channels, or refresh tracked channels.

use anyhow::{Context, Result};
use channelscope_core::analytics::{refresh_tracked, RefreshOutcome};
use channelscope_core::format::{format_count, format_percent, format_relative_time};
use channelscope_core::{
    create_source, BlockingCoordinator, ChannelSnapshot, Config, PostSummary, SnapshotCoordinator,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;

#[derive(Parser, Debug)]
#[command(name = "channelscope")]
#[command(about = "Engagement analytics for Telegram channels")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a single channel
    Analyze {
        /// Channel link or handle (https://t.me/name, @name)
        reference: String,

        /// Include pro metrics (ER, cadence, reactions, top/flop posts)
        #[arg(long)]
        pro: bool,

        /// Bypass the snapshot cache
        #[arg(long)]
        fresh: bool,
    },

    /// Compare two channels side by side
    Compare {
        first: String,
        second: String,

        /// Include pro metrics
        #[arg(long)]
        pro: bool,
    },

    /// Refresh tracked channels and print their history points
    Track {
        /// Channel links or handles
        #[arg(required = true)]
        references: Vec<String>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard = channelscope_core::logging::init(&config.logging)
        .context("failed to initialize logging")?;

    let source = create_source(&config.upstream).context("invalid upstream configuration")?;
    let coordinator = BlockingCoordinator::new(SnapshotCoordinator::from_config(source, &config))
        .context("failed to start async runtime")?;

    match args.command {
        Command::Analyze {
            reference,
            pro,
            fresh,
        } => {
            let snapshot = coordinator
                .get(&reference, pro, fresh)
                .with_context(|| format!("could not get data for channel {}", reference))?;

            output_then_cleanup(&[&snapshot], || match args.format {
                OutputFormat::Json => print_json(&snapshot),
                OutputFormat::Text => {
                    print_snapshot(&snapshot);
                    Ok(())
                }
            })?;
        }
        Command::Compare { first, second, pro } => {
            let a = coordinator
                .get(&first, pro, false)
                .with_context(|| format!("could not get data for channel {}", first))?;
            let b = match coordinator.get(&second, pro, false) {
                Some(b) => b,
                None => {
                    remove_avatar(&a);
                    anyhow::bail!("could not get data for channel {}", second);
                }
            };

            output_then_cleanup(&[&a, &b], || match args.format {
                OutputFormat::Json => print_json(&[&a, &b]),
                OutputFormat::Text => {
                    print_comparison(&a, &b);
                    Ok(())
                }
            })?;
        }
        Command::Track { references } => {
            let outcomes = coordinator.block_on(|c| refresh_tracked(c, references.as_slice()));
            let failed = outcomes.iter().filter(|o| o.point().is_none()).count();

            match args.format {
                OutputFormat::Json => print_json(&outcomes)?,
                OutputFormat::Text => print_outcomes(&outcomes),
            }

            if failed > 0 {
                anyhow::bail!("{} of {} channels could not be refreshed", failed, outcomes.len());
            }
        }
    }

    Ok(())
}

/// Run `print`, then delete the snapshots' avatar files even if it failed.
fn output_then_cleanup<F>(snapshots: &[&ChannelSnapshot], print: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    let printed = print();
    for snapshot in snapshots {
        remove_avatar(snapshot);
    }
    printed
}

/// Fresh snapshots hand us ownership of their temporary avatar file.
fn remove_avatar(snapshot: &ChannelSnapshot) {
    if let Some(path) = &snapshot.avatar_path {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove avatar");
        }
    }
}

/// Print `value` as pretty JSON. Fails on serialization or a closed stdout.
fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    write_json(&mut stdout, value)
}

fn write_json<W: Write, T: serde::Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn print_snapshot(snapshot: &ChannelSnapshot) {
    println!();
    println!("  {}", snapshot.name);
    if let Some(handle) = &snapshot.handle {
        println!("  @{}", handle);
    }
    println!("  fetched {}", format_relative_time(snapshot.fetched_at));
    println!();
    println!("   Subscribers:   {}", format_count(snapshot.subscribers));
    println!("   Avg views:     {}", format_count(snapshot.avg_views));

    let Some(pro) = &snapshot.pro else {
        println!();
        println!("  Run with --pro for engagement, cadence and top/flop posts.");
        println!();
        return;
    };

    println!("   ER:            {}", format_percent(pro.engagement_rate));
    println!("   Posts/day:     {:.1}", pro.posts_per_day);
    println!("   Reaction rate: {}", format_percent(pro.reaction_rate));
    println!(
        "   Views (24h+):  {} - {}",
        format_count(pro.min_views),
        format_count(pro.max_views)
    );

    print_posts("TOP POSTS", &pro.top_posts);
    print_posts("FLOP POSTS", &pro.flop_posts);
    println!();
}

fn print_posts(title: &str, posts: &[PostSummary]) {
    if posts.is_empty() {
        return;
    }
    println!();
    println!("  {}", title);
    for (i, post) in posts.iter().enumerate() {
        println!("   {}. {:>8}  {}", i + 1, format_count(post.views), post.text);
        println!("      {}", post.link);
    }
}

fn print_comparison(a: &ChannelSnapshot, b: &ChannelSnapshot) {
    let row = |label: &str, left: String, right: String| {
        println!("   {:<14} {:>16} {:>16}", label, left, right);
    };

    println!();
    row("", truncate(&a.name, 16), truncate(&b.name, 16));
    row(
        "Subscribers",
        format_count(a.subscribers),
        format_count(b.subscribers),
    );
    row("Avg views", format_count(a.avg_views), format_count(b.avg_views));

    if let (Some(pa), Some(pb)) = (&a.pro, &b.pro) {
        row(
            "ER",
            format_percent(pa.engagement_rate),
            format_percent(pb.engagement_rate),
        );
        row(
            "Posts/day",
            format!("{:.1}", pa.posts_per_day),
            format!("{:.1}", pb.posts_per_day),
        );
        row(
            "Reaction rate",
            format_percent(pa.reaction_rate),
            format_percent(pb.reaction_rate),
        );
    }
    println!();
}

fn print_outcomes(outcomes: &[RefreshOutcome]) {
    for outcome in outcomes {
        match outcome {
            RefreshOutcome::Updated(point) => println!(
                "  ok      {:<32} subscribers={} er={} avg_views={}",
                point.reference,
                point.subscribers,
                format_percent(point.engagement_rate),
                point.avg_views
            ),
            RefreshOutcome::Failed { reference } => println!("  failed  {}", reference),
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}

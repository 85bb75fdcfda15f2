use colored::{ColoredString, Colorize as _};

use crate::data::{CacheSnapshot, Severity, SeverityCounts, UpdateMetadata};

fn severity_label(severity: Severity) -> ColoredString {
    let label = severity.to_string();
    match severity {
        Severity::High => label.red().bold(),
        Severity::Medium => label.yellow(),
        Severity::Low => label.dimmed(),
    }
}

fn format_counts(counts: &SeverityCounts) -> String {
    format!(
        "{} {}  {} {}  {} {}",
        counts.high.to_string().red().bold(),
        "high".dimmed(),
        counts.medium.to_string().yellow().bold(),
        "medium".dimmed(),
        counts.low.to_string().bold(),
        "low".dimmed(),
    )
}

/// First line of a comment body, shortened for terminal output
fn excerpt(body: &str, max_chars: usize) -> String {
    let line = body.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    if line.chars().count() > max_chars {
        let cut: String = line.chars().take(max_chars).collect();
        format!("{cut}…")
    } else {
        line.to_owned()
    }
}

/// Print the cache metadata
pub fn print_metadata(metadata: &UpdateMetadata) {
    println!("{:26}{}", "Last update:".cyan().bold(), metadata.last_update);
    println!(
        "{:26}{}",
        "Repositories:".cyan().bold(),
        metadata.repository_count.to_string().green().bold()
    );
    println!(
        "{:26}{}",
        "Pull requests:".cyan().bold(),
        metadata.total_prs.to_string().green().bold()
    );
    println!(
        "{:26}{}",
        "Actionable comments:".cyan().bold(),
        metadata.total_actionable_comments.to_string().yellow().bold()
    );
}

/// Print a snapshot, optionally listing every actionable comment
pub fn print_snapshot(snapshot: &CacheSnapshot, verbose: bool) {
    println!("Actionable review comments as of {}:", snapshot.last_update);
    println!("{}", "=".repeat(50));

    if snapshot.repositories.is_empty() {
        println!("{}", "Nothing actionable.".dimmed());
    }

    for repo in &snapshot.repositories {
        println!(
            "{} {}",
            format!("{}/{}", repo.owner, repo.name).cyan().bold(),
            format!("(last push {})", repo.last_push).dimmed()
        );
        for pr in &repo.pull_requests {
            println!(
                "  #{:<6}{}  {}",
                pr.number.to_string().green().bold(),
                pr.title,
                format!("by {}", pr.author).dimmed()
            );
            println!("          {}", format_counts(&pr.severity_counts));
            if verbose {
                for item in &pr.actionable_comments {
                    let location = match (&item.comment.path, item.comment.line) {
                        (Some(path), Some(line)) => format!(" {path}:{line}"),
                        (Some(path), None) => format!(" {path}"),
                        _ => String::new(),
                    };
                    println!(
                        "          - [{}]{} {}: {}",
                        severity_label(item.severity),
                        location.dimmed(),
                        item.comment.author,
                        excerpt(&item.comment.body, 80)
                    );
                    println!("            {}", item.comment.url.bright_blue());
                }
            }
        }
    }

    println!("{}", "=".repeat(50));
    print_metadata(&snapshot.metadata());
}

/// Print a unified diff with added/removed lines highlighted
pub fn print_diff(diff: &str) {
    for line in diff.lines() {
        if line.starts_with("+++") || line.starts_with("---") || line.starts_with("diff ") {
            println!("{}", line.bold());
        } else if line.starts_with("@@") {
            println!("{}", line.cyan());
        } else if line.starts_with('+') {
            println!("{}", line.green());
        } else if line.starts_with('-') {
            println!("{}", line.red());
        } else {
            println!("{line}");
        }
    }
}

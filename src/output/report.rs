//! Markdown scouting report and its styled HTML rendering

use chrono::Local;
use pulldown_cmark::{Options, Parser, html};
use roundscout_core::{AgentPosition, Cluster, PositionRecord, Team};
use std::path::Path;

pub struct ReportGenerator {
    generated_at: String,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportGenerator {
    pub fn new() -> Self {
        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Fixed generation time, used by tests.
    pub fn with_timestamp(generated_at: impl Into<String>) -> Self {
        Self {
            generated_at: generated_at.into(),
        }
    }

    pub fn generate_markdown(
        &self,
        records: &[PositionRecord],
        formations: &[(Team, Vec<Cluster>)],
        video: Option<&Path>,
    ) -> String {
        let mut sorted: Vec<&PositionRecord> = records.iter().collect();
        sorted.sort_by_key(|r| r.round_num);

        let mut lines = vec!["# Scouting Report".to_string(), String::new()];
        lines.push(format!("Generated: {}", self.generated_at));
        if let Some(name) = video.and_then(|v| v.file_name()) {
            lines.push(format!("Video: {}", name.to_string_lossy()));
        }
        lines.push(format!("Total rounds: {}", sorted.len()));
        lines.push(String::new());

        for (team, clusters) in formations.iter().filter(|(_, c)| !c.is_empty()) {
            lines.push("---".to_string());
            lines.push(String::new());
            lines.push(format!("## Formation Groups ({})", side_label(*team)));
            lines.push(String::new());

            for cluster in clusters {
                let mut rounds = cluster.rounds.clone();
                rounds.sort_unstable();

                lines.push(format!("### {} ({} rounds)", cluster.name, rounds.len()));
                lines.push(String::new());
                let members: Vec<String> = rounds.iter().map(|r| format!("Round {}", r)).collect();
                lines.push(format!("**Rounds**: {}", members.join(", ")));
                lines.push(String::new());
                lines.push("| Round | Minimap | Attack | Defend |".to_string());
                lines.push("|-------|---------|--------|--------|".to_string());

                for round in rounds {
                    let Some(record) = sorted.iter().find(|r| r.round_num == round) else {
                        continue;
                    };
                    lines.push(format!(
                        "| Round {} | ![{file}]({file}) | {} | {} |",
                        round,
                        record.attack.len(),
                        record.defend.len(),
                        file = record.minimap_file,
                    ));
                }
                lines.push(String::new());
            }
        }

        lines.push("---".to_string());
        lines.push(String::new());
        lines.push("## Round Details".to_string());
        lines.push(String::new());

        for record in &sorted {
            lines.push(format!("### Round {}", record.round_num));
            lines.push(String::new());
            lines.push(format!("**Timestamp**: {:.2}s", record.timestamp));
            lines.push(String::new());
            push_side(&mut lines, "Attack", &record.attack);
            push_side(&mut lines, "Defend", &record.defend);
            lines.push(format!("![Minimap]({})", record.minimap_file));
            lines.push(String::new());
            lines.push("---".to_string());
            lines.push(String::new());
        }

        lines.push("## Notes".to_string());
        lines.push(String::new());
        lines.push("_Add notes here._".to_string());
        lines.push(String::new());

        lines.join("\n")
    }

    /// Render the markdown (tables included) into a standalone styled page.
    pub fn to_html(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);

        let mut body = String::new();
        html::push_html(&mut body, Parser::new_ext(markdown, options));

        format!("{}{}{}", HTML_HEAD, body, HTML_TAIL)
    }
}

const HTML_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Scouting Report</title>
<style>
body { font-family: "Helvetica Neue", Arial, sans-serif; line-height: 1.6; max-width: 1200px; margin: 0 auto; padding: 20px; background-color: #f5f5f5; }
h1, h2, h3 { color: #333; border-bottom: 2px solid #00a65a; padding-bottom: 10px; }
table { border-collapse: collapse; width: 100%; margin: 20px 0; background-color: white; }
th, td { border: 1px solid #ddd; padding: 12px; text-align: left; vertical-align: top; }
th { background-color: #00a65a; color: white; }
tr:nth-child(even) { background-color: #f9f9f9; }
img { max-width: 300px; height: auto; border: 1px solid #ddd; border-radius: 4px; }
code { background-color: #f4f4f4; padding: 2px 4px; border-radius: 3px; }
</style>
</head>
<body>
"#;

const HTML_TAIL: &str = "</body>\n</html>\n";

fn side_label(team: Team) -> &'static str {
    match team {
        Team::Attack => "Attack",
        Team::Defend => "Defend",
        Team::Unknown => "Unknown",
    }
}

fn push_side(lines: &mut Vec<String>, label: &str, agents: &[AgentPosition]) {
    lines.push(format!("**{}**:", label));
    for agent in agents {
        lines.push(format!(
            "- {} ({:.2}, {:.2}) - confidence: {:.1}%",
            agent.agent,
            agent.x,
            agent.y,
            agent.confidence * 100.0
        ));
    }
    lines.push(String::new());
}

use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use msgbus_frame::{MsgId, Payload};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    id: MsgId,
    method: &'a str,
    data: &'a Payload,
}

/// Print one message: a response (empty `method`) or a received request.
pub fn print_message(id: MsgId, method: &str, data: &Payload, format: OutputFormat) {
    println!("{}", render_message(id, method, data, format));
}

fn render_message(id: MsgId, method: &str, data: &Payload, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput { id, method, data };
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KEY", "VALUE"]);
            for (key, value) in data {
                table.add_row(vec![key.as_str(), value.as_str()]);
            }
            if method.is_empty() {
                format!("id={id}\n{table}")
            } else {
                format!("id={id} method={method}\n{table}")
            }
        }
        OutputFormat::Pretty => {
            let mut out = if method.is_empty() {
                format!("id={id}")
            } else {
                format!("id={id} method={method}")
            };
            for (key, value) in data {
                out.push_str(&format!("\n  {key}={value}"));
            }
            out
        }
    }
}

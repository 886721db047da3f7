//! Server-rendered HTML pages.

use std::fmt::Write;

use super::auth::can_admin;
use super::models::{AndonConfig, ProcessDetail, SensorSignal, User};

/// Escape text for use in HTML element content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLE: &str = "body{font-family:sans-serif;margin:0}\
nav{display:flex;gap:1rem;align-items:center;padding:.5rem 1rem;background:#222;color:#fff}\
nav a{color:#fff}main{padding:1rem}table{border-collapse:collapse;width:100%}\
th,td{border:1px solid #ccc;padding:.25rem .5rem;text-align:left}\
.board{display:grid;gap:.5rem}.card{border:2px solid #999;padding:.5rem}\
.running{background:#c8f7c5}.stopped{background:#ddd}.call{background:#fff3b0}.alert{background:#f7c5c5}";

/// Wrap `body` in the document shell. The nav bar is shown for signed-in users.
pub fn page(title: &str, user: Option<&User>, body: &str) -> String {
    let mut nav = String::new();
    if let Some(user) = user {
        let _ = write!(
            nav,
            "<nav><a href=\"/home\">Andon</a><a href=\"/processes\">Processes</a>\
             <a href=\"/workers\">Workers</a><span>{}</span>\
             <form method=\"post\" action=\"/logout\"><button type=\"submit\">Log out</button></form></nav>",
            escape(&user.name)
        );
    }
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>{}</title><style>{}</style></head><body>{}<main>{}</main></body></html>",
        escape(title),
        STYLE,
        nav,
        body
    )
}

pub fn login_page(error: Option<&str>, email: &str) -> String {
    let mut body = String::from("<h1>Log in</h1>");
    if let Some(error) = error {
        let _ = write!(body, "<p class=\"error\" role=\"alert\">{}</p>", escape(error));
    }
    let _ = write!(
        body,
        "<form method=\"post\" action=\"/login\">\
         <label>Email <input type=\"email\" name=\"email\" value=\"{}\" required></label>\
         <label>Password <input type=\"password\" name=\"password\" required></label>\
         <button type=\"submit\">Log in</button></form>",
        escape(email)
    );
    page("Log in", None, &body)
}

/// A list page: a table of already-rendered cells plus an optional add action.
pub struct Datatable<'a> {
    pub title: &'a str,
    pub headers: &'a [&'a str],
    pub rows: Vec<Vec<String>>,
    /// Target of the "add" action. Rendered only for users passing the
    /// `admin` gate.
    pub add_href: Option<&'a str>,
}

impl Datatable<'_> {
    pub fn render(&self, user: &User) -> String {
        let mut html = format!("<h1>{}</h1>", escape(self.title));
        if let Some(href) = self.add_href
            && can_admin(user)
        {
            let _ = write!(
                html,
                "<p><a class=\"add\" href=\"{}\">Add</a></p>",
                escape(href)
            );
        }

        html.push_str("<table><thead><tr>");
        for header in self.headers {
            let _ = write!(html, "<th>{}</th>", escape(header));
        }
        html.push_str("</tr></thead><tbody>");
        if self.rows.is_empty() {
            let _ = write!(
                html,
                "<tr><td colspan=\"{}\">No records</td></tr>",
                self.headers.len().max(1)
            );
        }
        for row in &self.rows {
            html.push_str("<tr>");
            for cell in row {
                let _ = write!(html, "<td>{}</td>", escape(cell));
            }
            html.push_str("</tr>");
        }
        html.push_str("</tbody></table>");
        page(self.title, Some(user), &html)
    }
}

/// A single-purpose create form posting `application/x-www-form-urlencoded`.
/// `fields` are `(name, label)` pairs of required text inputs.
pub fn create_form(user: &User, title: &str, action: &str, fields: &[(&str, &str)]) -> String {
    let mut html = format!(
        "<h1>{}</h1><form method=\"post\" action=\"{}\">",
        escape(title),
        escape(action)
    );
    for (name, label) in fields {
        let _ = write!(
            html,
            "<label>{} <input type=\"text\" name=\"{}\" required></label>",
            escape(label),
            escape(name)
        );
    }
    html.push_str("<button type=\"submit\">Save</button></form>");
    page(title, Some(user), &html)
}

fn signal_class(signal: Option<SensorSignal>) -> &'static str {
    signal.map(|s| s.as_str()).unwrap_or("stopped")
}

/// Processes the user has placed on the board, in layout order. Processes
/// without a layout row are shown after the placed ones.
pub fn board_processes(processes: &[ProcessDetail]) -> Vec<&ProcessDetail> {
    let mut visible: Vec<&ProcessDetail> = processes
        .iter()
        .filter(|p| p.andon_layout.as_ref().is_none_or(|l| l.is_display))
        .collect();
    visible.sort_by_key(|p| {
        (
            p.andon_layout.as_ref().map_or(i64::MAX, |l| l.order),
            p.process.process_id,
        )
    });
    visible
}

/// The Andon board.
pub fn board(user: &User, config: &AndonConfig, processes: &[ProcessDetail]) -> String {
    let visible = board_processes(processes);
    let per_page = (config.row_count * config.column_count).max(1) as usize;

    let mut html = format!(
        "<div class=\"board\" data-auto-play=\"{}\" data-auto-play-speed=\"{}\" data-per-page=\"{}\" \
         style=\"grid-template-columns:repeat({},1fr)\">",
        config.auto_play, config.auto_play_speed, per_page, config.column_count
    );
    for detail in &visible {
        let signal = detail.latest_signal();
        let _ = write!(
            html,
            "<section class=\"card {}\" data-process-id=\"{}\"><h2>{}</h2>",
            signal_class(signal),
            detail.process.process_id,
            escape(&detail.process.name)
        );
        if config.is_show_part_number {
            let _ = write!(html, "<p>Part #{}</p>", detail.process.process_id);
        }
        match &detail.production_history {
            Some(history) => {
                if config.is_show_start {
                    let _ = write!(html, "<p>Start {}</p>", escape(&history.history.start));
                }
                if config.is_show_plan_count {
                    let _ = write!(html, "<p>Plan {}</p>", history.history.plan_count);
                }
                let _ = write!(html, "<p>Actual {}</p>", history.produced_count());
                if config.is_show_achievement_rate
                    && let Some(rate) = history.achievement_rate()
                {
                    let _ = write!(html, "<p>Achievement {:.1}%</p>", rate);
                }
            }
            None => html.push_str("<p>Idle</p>"),
        }
        html.push_str("</section>");
    }
    if visible.is_empty() {
        html.push_str("<p>No processes on the board</p>");
    }
    html.push_str("</div>");
    page("Andon", Some(user), &html)
}

//! Per-connection statistics rendered as an HTML table
//!
//! Reads the same store as the checker, one connection at a time, keeping
//! only the first and last event of each.

use std::io::Write;

use chrono::{DateTime, Utc};
use mamirc_core::{ConnectionId, ConnectionPayload, Event, EventType};
use mamirc_storage::EventStore;
use tracing::{debug, instrument};

use crate::error::{CheckError, CheckResult};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%a %H:%M:%S UTC";

const MILLIS_PER_DAY: f64 = 86_400_000.0;

const HEADER: &str = r#"<!DOCTYPE html>
<html>
	<head>
		<meta charset="UTF-8">
		<title>MamIRC archive &ndash; Connection statistics</title>
		<style type="text/css">
			html {
				background-color: #FFFFFF;
				font-family: sans-serif;
				color: #000000;
			}
			table {
				border-collapse: collapse;
			}
			tr:hover {
				background-color: #F0F0F0;
			}
			th, td {
				padding: 0.3em 0.5em;
				border: 0.08em solid #E0E0E0;
			}
			td:nth-child(1), td:nth-child(4), td:nth-child(7) {
				text-align: right;
			}
			td span + span {
				margin-left: 0.3em;
			}
		</style>
	</head>
	<body>
		<h1>MamIRC archive &ndash; Connection statistics</h1>
		<table>
			<thead>
				<tr>
					<th>Connection ID</th>
					<th>Profile name</th>
					<th>Target server</th>
					<th>Amount of activity</th>
					<th>First timestamp</th>
					<th>Last timestamp</th>
					<th>Duration</th>
				</tr>
			</thead>
			<tbody>
"#;

const FOOTER: &str = "\t\t\t</tbody>\n\t\t</table>\n\t</body>\n</html>\n";

/// Summary of one connection
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStats {
    pub connection_id: ConnectionId,
    pub profile_name: String,
    /// `host port tls_mode`, as given in the connect payload
    pub server: String,
    /// Last sequence number plus one
    pub event_count: i64,
    pub first_timestamp: DateTime<Utc>,
    pub last_timestamp: DateTime<Utc>,
}

impl ConnectionStats {
    /// Time between the first and last event, in days
    pub fn duration_days(&self) -> f64 {
        let millis = self.last_timestamp.timestamp_millis() - self.first_timestamp.timestamp_millis();
        millis as f64 / MILLIS_PER_DAY
    }

    fn html_row(&self) -> String {
        let cells = [
            group_digits(self.connection_id.value()),
            escape_html(&self.profile_name),
            escape_html(&self.server),
            format!("{} events", group_digits(self.event_count)),
            self.first_timestamp.format(TIMESTAMP_FORMAT).to_string(),
            self.last_timestamp.format(TIMESTAMP_FORMAT).to_string(),
            format!("{:.3} days", self.duration_days()),
        ];
        let mut row = String::from("\t\t\t\t<tr>");
        for cell in cells {
            row.push_str("<td>");
            row.push_str(&cell);
            row.push_str("</td>");
        }
        row.push_str("</tr>\n");
        row
    }
}

/// Summarize one connection
///
/// # Errors
///
/// [`CheckError::InvalidConnection`] if the connection has no events or
/// does not start with a connect event at sequence 0; storage errors pass
/// through.
pub fn connection_stats<S: EventStore + ?Sized>(
    store: &S,
    connection_id: ConnectionId,
) -> CheckResult<ConnectionStats> {
    let invalid = |reason: &str| CheckError::InvalidConnection {
        connection_id,
        reason: reason.to_string(),
    };

    let first = store
        .events_for(connection_id)
        .next()
        .ok_or_else(|| invalid("no events"))??;
    let (server, profile_name) = parse_connect(&first).ok_or_else(|| invalid("first event is not a connect"))?;
    let last = store
        .last_event(connection_id)?
        .ok_or_else(|| invalid("no events"))?;

    let timestamp = |event: &Event| {
        event
            .timestamp()
            .ok_or_else(|| invalid("timestamp out of range"))
    };

    Ok(ConnectionStats {
        connection_id,
        profile_name,
        server,
        event_count: last.sequence.saturating_add(1),
        first_timestamp: timestamp(&first)?,
        last_timestamp: timestamp(&last)?,
    })
}

/// Returns `(server, profile name)` for a sequence-0 connect event
fn parse_connect(event: &Event) -> Option<(String, String)> {
    if event.sequence != 0 || event.event_type() != Some(EventType::Connection) {
        return None;
    }
    match ConnectionPayload::parse(&event.payload).ok()? {
        ConnectionPayload::Connect {
            server_host,
            server_port,
            tls_mode,
            profile_name,
        } => Some((format!("{server_host} {server_port} {tls_mode}"), profile_name)),
        _ => None,
    }
}

/// Write the full HTML report, one row per connection in ID order
///
/// Returns the number of rows written.
#[instrument(skip_all)]
pub fn write_html_report<S, W>(store: &S, mut out: W) -> CheckResult<u64>
where
    S: EventStore + ?Sized,
    W: Write,
{
    out.write_all(HEADER.as_bytes())?;
    let mut rows = 0;
    for id in store.connection_ids() {
        let stats = connection_stats(store, id?)?;
        out.write_all(stats.html_row().as_bytes())?;
        rows += 1;
    }
    out.write_all(FOOTER.as_bytes())?;
    out.flush()?;

    debug!(rows, "Wrote connection statistics");
    Ok(rows)
}

/// Wrap each group of three digits in a `<span>`
fn group_digits(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut groups = Vec::new();
    let mut end = digits.len();
    while end > 0 {
        let start = end.saturating_sub(3);
        groups.push(&digits[start..end]);
        end = start;
    }

    let mut result = String::new();
    if value < 0 {
        result.push('-');
    }
    for group in groups.iter().rev() {
        result.push_str("<span>");
        result.push_str(group);
        result.push_str("</span>");
    }
    result
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use mamirc_storage::InMemoryEventStore;

    const DAY: i64 = 86_400_000;

    #[test]
    fn test_group_digits() {
        assert_eq!(group_digits(0), "<span>0</span>");
        assert_eq!(group_digits(999), "<span>999</span>");
        assert_eq!(group_digits(1000), "<span>1</span><span>000</span>");
        assert_eq!(
            group_digits(-1234567),
            "-<span>1</span><span>234</span><span>567</span>"
        );
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>Tom & \"Jerry\"</b>"), "&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;");
    }

    #[test]
    fn test_connection_stats() {
        let store = InMemoryEventStore::from_events([
            Event::connection(7, 0, 0, "connect irc.example.org 6697 ssl My Network"),
            Event::connection(7, 1, 10, "opened 198.51.100.1"),
            Event::new(7, 2, DAY / 2, EventType::Inbound, &b"PING :a"[..]),
            Event::connection(7, 3, DAY + DAY / 2, "closed"),
        ]);

        let stats = connection_stats(&store, ConnectionId(7)).unwrap();
        assert_eq!(stats.profile_name, "My Network");
        assert_eq!(stats.server, "irc.example.org 6697 ssl");
        assert_eq!(stats.event_count, 4);
        assert!((stats.duration_days() - 1.5).abs() < 1e-9);
        assert_eq!(
            stats.first_timestamp.format(TIMESTAMP_FORMAT).to_string(),
            "1970-01-01-Thu 00:00:00 UTC"
        );
    }

    #[test]
    fn test_connection_not_starting_with_connect_is_rejected() {
        let store = InMemoryEventStore::from_events([Event::connection(1, 0, 0, "closed")]);
        assert!(matches!(
            connection_stats(&store, ConnectionId(1)),
            Err(CheckError::InvalidConnection { .. })
        ));
        assert!(matches!(
            connection_stats(&store, ConnectionId(2)),
            Err(CheckError::InvalidConnection { .. })
        ));
    }

    #[test]
    fn test_html_report_rows() {
        let store = InMemoryEventStore::from_events([
            Event::connection(0, 0, 0, "connect a.example 6667 nossl <Home>"),
            Event::connection(0, 1, 1_000, "closed"),
            Event::connection(1234, 0, 0, "connect b.example 6697 ssl Work"),
        ]);

        let mut out = Vec::new();
        let rows = write_html_report(&store, &mut out).unwrap();
        assert_eq!(rows, 2);

        let html = String::from_utf8(out).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.ends_with("</html>\n"));
        assert!(html.contains("<td>&lt;Home&gt;</td><td>a.example 6667 nossl</td>"));
        assert!(html.contains("<td><span>1</span><span>234</span></td>"));
        assert!(html.contains("<td><span>2</span> events</td>"));
        assert!(html.contains("<td>0.000 days</td>"));
    }
}

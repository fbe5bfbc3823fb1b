use crate::history::History;

pub const NOT_STARTED: &str = "System not yet started";

/// Arithmetic mean; 0 for an empty slice.
pub fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Minimum element; 0 for an empty slice.
pub fn min(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

/// Maximum element; 0 for an empty slice.
pub fn max(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

/// Renders an elapsed duration as "H:M:S" with no zero padding, matching the
/// literal integer arithmetic rather than a fixed-width clock.
pub fn format_elapsed(elapsed_ms: i64) -> String {
    if elapsed_ms <= 0 {
        return NOT_STARTED.to_string();
    }
    let total_secs = elapsed_ms / 1000;
    let seconds = total_secs % 60;
    let minutes = (total_secs / 60) % 60;
    let hours = total_secs / 3600;
    format!("{hours}:{minutes}:{seconds}")
}

/// An ordered list of (label, formatted value) rows. Rebuilt wholesale on
/// every recomputation; omitted rows are absent, never placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticTable {
    rows: Vec<(String, String)>,
}

impl StatisticTable {
    fn push(&mut self, label: &str, value: impl Into<String>) {
        self.rows.push((label.to_string(), value.into()));
    }

    pub fn rows(&self) -> &[(String, String)] {
        &self.rows
    }

    pub(crate) fn get(&self, label: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|(row_label, _)| row_label == label)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsBundle {
    pub general: StatisticTable,
    pub ser: StatisticTable,
    pub super_peer: StatisticTable,
}

/// Derive all three statistic tables from the latest snapshot. Pure: the same
/// snapshot, node count and elapsed time always yield identical tables.
pub fn recompute(
    history: Option<&History>,
    node_count: usize,
    elapsed_ms: Option<i64>,
) -> StatsBundle {
    let (ser, super_peer) = match history {
        Some(history) => (
            category_table(
                history
                    .ser_messages
                    .values()
                    .map(|m| (m.messages_count, m.hop_counts.as_slice())),
            ),
            category_table(
                history
                    .ser_super_peer_messages
                    .values()
                    .map(|m| (m.messages_count, m.hop_counts.as_slice())),
            ),
        ),
        None => (StatisticTable::default(), StatisticTable::default()),
    };

    StatsBundle {
        general: general_table(history, node_count, elapsed_ms),
        ser,
        super_peer,
    }
}

fn general_table(
    history: Option<&History>,
    node_count: usize,
    elapsed_ms: Option<i64>,
) -> StatisticTable {
    let mut table = StatisticTable::default();

    if let Some(elapsed) = elapsed_ms {
        table.push("System Up Time (H:mm:ss)", format_elapsed(elapsed));
    }
    table.push("Total Nodes", node_count.to_string());

    let Some(history) = history else {
        return table;
    };

    if history.bootstrapping_message_count > 0 {
        table.push(
            "Total Bootstrapping Messages Count",
            history.bootstrapping_message_count.to_string(),
        );
        if node_count > 0 {
            let per_node = history.bootstrapping_message_count as f64 / node_count as f64;
            table.push(
                "Bootstrapping Messages Count (per node)",
                format!("{per_node:.2}"),
            );
        }
    }

    if history.maintenance_message_count > 0 {
        if let Some(elapsed) = elapsed_ms.filter(|e| *e > 0) {
            let per_minute =
                history.maintenance_message_count as f64 / (elapsed as f64 / 60_000.0);
            table.push(
                "Maintenance Messages Count (per minute)",
                format!("{per_minute:.2}"),
            );
            if node_count > 0 {
                table.push(
                    "Maintenance Messages Count (per minute per node)",
                    format!("{:.2}", per_minute / node_count as f64),
                );
            }
        }
    }

    table
}

// One algorithm for both message categories, each against its own map. An
// entry counts as a successful query iff it has at least one hop count.
fn category_table<'a>(entries: impl Iterator<Item = (u64, &'a [u64])>) -> StatisticTable {
    let entries: Vec<(u64, &[u64])> = entries.collect();

    let mut hop_counts: Vec<f64> = Vec::new();
    let mut successful = 0usize;
    for (_, hops) in &entries {
        if !hops.is_empty() {
            successful += 1;
            hop_counts.extend(hops.iter().map(|&h| h as f64));
        }
    }

    let mut table = StatisticTable::default();

    if !entries.is_empty() {
        let rate = successful as f64 * 100.0 / entries.len() as f64;
        table.push("Success Rate", format!("{rate:.2}%"));
    }

    if !hop_counts.is_empty() {
        table.push("Average Hops (per query)", format!("{:.2}", average(&hop_counts)));
        table.push("Minimum Hops (per query)", format!("{}", min(&hop_counts)));
        table.push("Maximum Hops (per query)", format!("{}", max(&hop_counts)));
    }

    let message_counts: Vec<f64> = entries.iter().map(|(count, _)| *count as f64).collect();
    let total_messages: u64 = entries.iter().map(|(count, _)| *count).sum();

    if !message_counts.is_empty() {
        table.push(
            "Average Messages (per query)",
            format!("{:.2}", average(&message_counts)),
        );
        table.push(
            "Minimum Messages (per query)",
            format!("{}", min(&message_counts)),
        );
        table.push(
            "Maximum Messages (per query)",
            format!("{}", max(&message_counts)),
        );
    }
    table.push("Total Messages", total_messages.to_string());

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{SerMessage, SerSuperPeerMessage};
    use std::collections::BTreeMap;

    #[test]
    fn stat_functions_on_empty_input() {
        assert_eq!(average(&[]), 0.0);
        assert_eq!(min(&[]), 0.0);
        assert_eq!(max(&[]), 0.0);
    }

    #[test]
    fn stat_functions_on_samples() {
        assert_eq!(average(&[2.0, 4.0, 6.0]), 4.0);
        assert_eq!(min(&[5.0, 1.0, 3.0]), 1.0);
        assert_eq!(max(&[5.0, 1.0, 3.0]), 5.0);
    }

    #[test]
    fn stat_functions_handle_negative_values() {
        assert_eq!(min(&[-3.0, 2.0]), -3.0);
        assert_eq!(max(&[-3.0, -2.0]), -2.0);
        assert_eq!(average(&[-2.0, 2.0]), 0.0);
    }

    #[test]
    fn min_average_max_ordering_holds() {
        let samples: &[&[f64]] = &[&[1.0], &[3.0, 7.0, 5.0], &[0.0, 0.0, 9.0]];
        for xs in samples {
            assert!(min(xs) <= average(xs));
            assert!(average(xs) <= max(xs));
        }
    }

    #[test]
    fn elapsed_time_formatting() {
        assert_eq!(format_elapsed(0), NOT_STARTED);
        assert_eq!(format_elapsed(-5), NOT_STARTED);
        assert_eq!(format_elapsed(3_661_000), "1:1:1");
        assert_eq!(format_elapsed(59_000), "0:0:59");
        assert_eq!(format_elapsed(90_061_000), "25:1:1");
    }

    fn ser_message(query: &str, messages_count: u64, hop_counts: Vec<u64>) -> SerMessage {
        SerMessage {
            query: query.to_string(),
            messages_count,
            hop_counts,
        }
    }

    fn sample_history() -> History {
        let mut ser_messages = BTreeMap::new();
        ser_messages.insert(0, ser_message("q0", 3, vec![2, 4]));
        ser_messages.insert(1, ser_message("q1", 1, vec![]));

        let mut super_peer = BTreeMap::new();
        super_peer.insert(
            0,
            SerSuperPeerMessage {
                messages_count: 10,
                hop_counts: vec![5],
            },
        );

        History {
            start_up_timestamp: 1_500_000_000_000,
            ser_messages,
            ser_super_peer_messages: super_peer,
            bootstrapping_message_count: 12,
            maintenance_message_count: 30,
        }
    }

    #[test]
    fn ser_table_success_rate_and_hops() {
        let bundle = recompute(Some(&sample_history()), 3, Some(60_000));

        assert_eq!(bundle.ser.get("Success Rate"), Some("50.00%"));
        assert_eq!(bundle.ser.get("Average Hops (per query)"), Some("3.00"));
        assert_eq!(bundle.ser.get("Minimum Hops (per query)"), Some("2"));
        assert_eq!(bundle.ser.get("Maximum Hops (per query)"), Some("4"));
        assert_eq!(bundle.ser.get("Average Messages (per query)"), Some("2.00"));
        assert_eq!(bundle.ser.get("Total Messages"), Some("4"));
    }

    #[test]
    fn super_peer_table_reads_its_own_map() {
        let bundle = recompute(Some(&sample_history()), 3, Some(60_000));

        assert_eq!(bundle.super_peer.get("Success Rate"), Some("100.00%"));
        assert_eq!(bundle.super_peer.get("Average Hops (per query)"), Some("5.00"));
        assert_eq!(bundle.super_peer.get("Total Messages"), Some("10"));
    }

    #[test]
    fn empty_map_yields_only_total_messages() {
        let history = History {
            start_up_timestamp: 1,
            ..History::default()
        };
        let bundle = recompute(Some(&history), 0, Some(1_000));

        assert_eq!(bundle.ser.rows(), &[("Total Messages".to_string(), "0".to_string())]);
        assert_eq!(
            bundle.super_peer.rows(),
            &[("Total Messages".to_string(), "0".to_string())]
        );
    }

    #[test]
    fn absent_history_yields_empty_category_tables() {
        let bundle = recompute(None, 2, None);
        assert!(bundle.ser.is_empty());
        assert!(bundle.super_peer.is_empty());
        assert_eq!(bundle.general.get("Total Nodes"), Some("2"));
        assert_eq!(bundle.general.get("System Up Time (H:mm:ss)"), None);
    }

    #[test]
    fn general_table_row_order_and_values() {
        let bundle = recompute(Some(&sample_history()), 3, Some(120_000));
        let labels: Vec<&str> = bundle
            .general
            .rows()
            .iter()
            .map(|(label, _)| label.as_str())
            .collect();

        assert_eq!(
            labels,
            vec![
                "System Up Time (H:mm:ss)",
                "Total Nodes",
                "Total Bootstrapping Messages Count",
                "Bootstrapping Messages Count (per node)",
                "Maintenance Messages Count (per minute)",
                "Maintenance Messages Count (per minute per node)",
            ]
        );
        assert_eq!(bundle.general.get("System Up Time (H:mm:ss)"), Some("0:2:0"));
        assert_eq!(
            bundle.general.get("Bootstrapping Messages Count (per node)"),
            Some("4.00")
        );
        // 30 messages over 2 minutes
        assert_eq!(
            bundle.general.get("Maintenance Messages Count (per minute)"),
            Some("15.00")
        );
        assert_eq!(
            bundle
                .general
                .get("Maintenance Messages Count (per minute per node)"),
            Some("5.00")
        );
    }

    #[test]
    fn zero_counters_omit_their_rows() {
        let history = History {
            start_up_timestamp: 1,
            ..History::default()
        };
        let bundle = recompute(Some(&history), 3, Some(60_000));

        assert_eq!(bundle.general.get("Total Bootstrapping Messages Count"), None);
        assert_eq!(
            bundle.general.get("Maintenance Messages Count (per minute)"),
            None
        );
    }

    #[test]
    fn maintenance_rate_needs_positive_elapsed_time() {
        let bundle = recompute(Some(&sample_history()), 3, Some(0));
        assert_eq!(
            bundle.general.get("Maintenance Messages Count (per minute)"),
            None
        );
    }

    #[test]
    fn recompute_is_idempotent() {
        let history = sample_history();
        let first = recompute(Some(&history), 3, Some(60_000));
        let second = recompute(Some(&history), 3, Some(60_000));
        assert_eq!(first, second);
    }
}

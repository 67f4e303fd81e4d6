//! Log filter matching.

use crate::domain::{Address, BlockRef, FilterAddress, FilterTopic, Hash, LogFields, LogFilter};
use serde_json::Value;

/// Check if a log matches a filter's address and topic constraints.
pub fn matches(filter: &LogFilter, log_address: &Address, log_topics: &[Hash]) -> bool {
    if let Some(ref addr_filter) = filter.address {
        let matches = match addr_filter {
            FilterAddress::Single(addr) => addr == log_address,
            FilterAddress::Multiple(addrs) => addrs.is_empty() || addrs.contains(log_address),
        };
        if !matches {
            return false;
        }
    }

    if let Some(ref topics) = filter.topics {
        for (i, topic_filter) in topics.iter().enumerate() {
            let Some(topic_filter) = topic_filter else {
                continue;
            };
            let Some(log_topic) = log_topics.get(i) else {
                return false;
            };

            let matches = match topic_filter {
                FilterTopic::Single(t) => t == log_topic,
                FilterTopic::Multiple(ts) => ts.is_empty() || ts.contains(log_topic),
            };
            if !matches {
                return false;
            }
        }
    }

    true
}

/// Match a raw backend log. Logs that cannot be parsed never match.
pub fn matches_value(filter: &LogFilter, log: &Value) -> bool {
    let Ok(fields) = serde_json::from_value::<LogFields>(log.clone()) else {
        return false;
    };
    matches(filter, &fields.address, &fields.topics)
        && fields
            .block_number
            .is_none_or(|n| in_block_range(filter, n.0))
}

/// Whether `number` lies within the filter's explicit block bounds.
///
/// Tag bounds (`latest`, `pending`) are open-ended.
pub fn in_block_range(filter: &LogFilter, number: u64) -> bool {
    let above_from = match filter.from_block {
        Some(BlockRef::Number(from)) => number >= from,
        _ => true,
    };
    let below_to = match filter.to_block {
        Some(BlockRef::Number(to)) => number <= to,
        _ => true,
    };
    above_from && below_to
}

use std::collections::HashMap;

use crate::models::connection::{Connection, RawConnectionSnapshot};

/// Build a [`Connection`] from a raw snapshot and the same connection's
/// previous cycle, if there was one.
///
/// Speed is the plain difference of the cumulative counters and is not
/// clamped. A first sighting has zero speed.
pub fn restruct_raw_msg_to_connection(
    raw: &RawConnectionSnapshot,
    previous: Option<&Connection>,
) -> Connection {
    let (download_speed, upload_speed) = match previous {
        Some(prev) if prev.id() == raw.id => (
            counter_delta(raw.download, prev.snapshot.download),
            counter_delta(raw.upload, prev.snapshot.upload),
        ),
        _ => (0, 0),
    };

    Connection {
        snapshot: raw.clone(),
        download_speed,
        upload_speed,
    }
}

/// Normalize a whole message against the previous cycle's active list
pub fn normalize(raw_list: &[RawConnectionSnapshot], previous_active: &[Connection]) -> Vec<Connection> {
    let previous: HashMap<&str, &Connection> = previous_active
        .iter()
        .map(|conn| (conn.id(), conn))
        .collect();

    raw_list
        .iter()
        .map(|raw| restruct_raw_msg_to_connection(raw, previous.get(raw.id.as_str()).copied()))
        .collect()
}

fn counter_delta(current: u64, previous: u64) -> i64 {
    (current as i128 - previous as i128).clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, upload: u64, download: u64) -> RawConnectionSnapshot {
        RawConnectionSnapshot {
            id: id.to_string(),
            upload,
            download,
            ..Default::default()
        }
    }

    #[test]
    fn test_first_sighting_has_zero_speed() {
        let conns = normalize(&[raw("a", 300, 1000)], &[]);
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].download_speed, 0);
        assert_eq!(conns[0].upload_speed, 0);
    }

    #[test]
    fn test_speed_is_counter_delta() {
        let first = normalize(&[raw("a", 100, 1000)], &[]);
        let second = normalize(&[raw("a", 160, 1500)], &first);

        assert_eq!(second[0].download_speed, 500);
        assert_eq!(second[0].upload_speed, 60);
        assert_eq!(second[0].snapshot.download, 1500);
    }

    #[test]
    fn test_negative_speed_is_kept() {
        let first = normalize(&[raw("a", 100, 1000)], &[]);
        let second = normalize(&[raw("a", 100, 400)], &first);
        assert_eq!(second[0].download_speed, -600);
    }

    #[test]
    fn test_mismatched_previous_is_ignored() {
        let prev = normalize(&[raw("b", 10, 10)], &[]);
        let conn = restruct_raw_msg_to_connection(&raw("a", 50, 50), prev.first());
        assert_eq!(conn.download_speed, 0);
        assert_eq!(conn.upload_speed, 0);
    }

    #[test]
    fn test_only_matching_ids_get_speed() {
        let first = normalize(&[raw("a", 0, 100), raw("b", 0, 100)], &[]);
        let second = normalize(&[raw("b", 0, 250), raw("c", 0, 900)], &first);

        assert_eq!(second[0].id(), "b");
        assert_eq!(second[0].download_speed, 150);
        assert_eq!(second[1].id(), "c");
        assert_eq!(second[1].download_speed, 0);
    }
}

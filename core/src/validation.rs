//! Admission checks for items leaving the device.
//!
//! The server rejects a whole `PATCH /list` batch over a single malformed
//! element, so the push path filters bad items out instead of failing the
//! cycle. A batch that filters down to empty is not sent at all.

use tracing::warn;

use crate::types::ItemDto;

/// Whether a DTO is complete enough to send to the server.
pub fn dto_is_valid(dto: &ItemDto) -> bool {
    !dto.id.is_empty()
        && !dto.text.is_empty()
        && !dto.importance.is_empty()
        && !dto.last_updated_by.is_empty()
}

/// Drops invalid DTOs from a batch, logging each rejection.
pub fn filter_valid(dtos: Vec<ItemDto>) -> Vec<ItemDto> {
    dtos.into_iter()
        .filter(|dto| {
            let valid = dto_is_valid(dto);
            if !valid {
                warn!(id = %dto.id, "dropping invalid item from sync batch");
            }
            valid
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(id: &str) -> ItemDto {
        ItemDto {
            id: id.to_string(),
            text: "buy milk".to_string(),
            importance: "normal".to_string(),
            deadline: None,
            done: false,
            color: None,
            created_at: 1_700_000_000,
            changed_at: Some(1_700_000_000),
            last_updated_by: "device-1".to_string(),
        }
    }

    #[test]
    fn complete_dto_is_valid() {
        assert!(dto_is_valid(&dto("a")));
    }

    #[test]
    fn empty_required_fields_are_invalid() {
        let mut missing_id = dto("a");
        missing_id.id.clear();
        assert!(!dto_is_valid(&missing_id));

        let mut missing_text = dto("b");
        missing_text.text.clear();
        assert!(!dto_is_valid(&missing_text));

        let mut missing_importance = dto("c");
        missing_importance.importance.clear();
        assert!(!dto_is_valid(&missing_importance));

        let mut missing_author = dto("d");
        missing_author.last_updated_by.clear();
        assert!(!dto_is_valid(&missing_author));
    }

    #[test]
    fn optional_fields_do_not_affect_validity() {
        let mut bare = dto("a");
        bare.deadline = None;
        bare.color = None;
        bare.changed_at = None;
        assert!(dto_is_valid(&bare));
    }

    #[test]
    fn filter_keeps_only_valid_dtos() {
        let mut broken = dto("b");
        broken.text.clear();
        let batch = vec![dto("a"), broken, dto("c")];

        let kept = filter_valid(batch);

        let ids: Vec<&str> = kept.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}

//! Read helpers for the screens that browse the beekeeping data.

use crate::entity::{Entity, EntityKind, FieldValue};
use crate::error::CoreResult;
use crate::store::LocalStore;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;

impl LocalStore {
    /// Live entities of `kind` belonging to a workspace.
    pub fn active_in_workspace(
        &self,
        kind: EntityKind,
        workspace_id: &str,
    ) -> CoreResult<Vec<Entity>> {
        self.query(kind, |e| text_field(e, "workspaceId") == Some(workspace_id))
    }

    /// First live entity of `kind` whose `field` equals `code`.
    ///
    /// Used to resolve scanned QR keys and NFC tag ids.
    pub fn find_by_code(
        &self,
        kind: EntityKind,
        field: &str,
        code: &str,
    ) -> CoreResult<Option<Entity>> {
        Ok(self
            .query(kind, |e| text_field(e, field) == Some(code))?
            .into_iter()
            .next())
    }

    /// Live children of a parent, newest first by `date_field`.
    ///
    /// Rows without the date sort last.
    pub fn children_by_date(
        &self,
        kind: EntityKind,
        parent_field: &str,
        parent_id: &str,
        date_field: &str,
    ) -> CoreResult<Vec<Entity>> {
        let mut rows = self.query(kind, |e| text_field(e, parent_field) == Some(parent_id))?;
        rows.sort_by_key(|e| Reverse(date(e, date_field)));
        Ok(rows)
    }

    /// Treatments whose withdrawal period (`sperrBis`) ends after `now`.
    pub fn active_withdrawal(&self, now: DateTime<Utc>) -> CoreResult<Vec<Entity>> {
        self.query(EntityKind::Treatment, |e| {
            date(e, "sperrBis").is_some_and(|until| until > now)
        })
    }
}

fn text_field<'a>(entity: &'a Entity, field: &str) -> Option<&'a str> {
    entity.field(field).and_then(FieldValue::as_str)
}

fn date(entity: &Entity, field: &str) -> Option<DateTime<Utc>> {
    entity.field(field).and_then(FieldValue::as_timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn workspace_filter_skips_tombstones() {
        let store = LocalStore::open_in_memory().unwrap();
        let now = Utc::now();
        let keep = Entity::new(EntityKind::Location, now).with_field("workspaceId", "ws-1");
        let gone = Entity::new(EntityKind::Location, now).with_field("workspaceId", "ws-1");
        let other = Entity::new(EntityKind::Location, now).with_field("workspaceId", "ws-2");
        for e in [&keep, &gone, &other] {
            store.create(e.clone()).unwrap();
        }
        store.delete(&gone.id).unwrap();

        let rows = store.active_in_workspace(EntityKind::Location, "ws-1").unwrap();
        assert_eq!(rows, vec![keep]);
    }

    #[test]
    fn find_by_qr_key() {
        let store = LocalStore::open_in_memory().unwrap();
        let colony = Entity::new(EntityKind::Colony, Utc::now()).with_field("qrKey", "QR-77");
        store.create(colony.clone()).unwrap();

        let hit = store.find_by_code(EntityKind::Colony, "qrKey", "QR-77").unwrap();
        assert_eq!(hit, Some(colony));
        assert!(store
            .find_by_code(EntityKind::Colony, "qrKey", "QR-00")
            .unwrap()
            .is_none());
    }

    #[test]
    fn inspections_newest_first() {
        let store = LocalStore::open_in_memory().unwrap();
        let now = Utc::now();
        let ids: Vec<_> = [3, 1, 2]
            .into_iter()
            .map(|days_ago| {
                let e = Entity::new(EntityKind::Inspection, now)
                    .with_field("volkId", "v-1")
                    .with_field("datum", now - Duration::days(days_ago));
                store.create(e.clone()).unwrap();
                (days_ago, e.id)
            })
            .collect();

        let rows = store
            .children_by_date(EntityKind::Inspection, "volkId", "v-1", "datum")
            .unwrap();
        let order: Vec<_> = rows
            .iter()
            .map(|r| ids.iter().find(|(_, id)| *id == r.id).unwrap().0)
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn withdrawal_period_filter() {
        let store = LocalStore::open_in_memory().unwrap();
        let now = Utc::now();
        let running = Entity::new(EntityKind::Treatment, now)
            .with_field("sperrBis", now + Duration::days(10));
        let expired = Entity::new(EntityKind::Treatment, now)
            .with_field("sperrBis", now - Duration::days(1));
        store.create(running.clone()).unwrap();
        store.create(expired).unwrap();

        assert_eq!(store.active_withdrawal(now).unwrap(), vec![running]);
    }
}

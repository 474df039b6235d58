//! Offset pagination for list queries
//!
//! A list field returns a [`ListPage`]: the rows selected by
//! `limit`/`offset` plus the unpaginated query, which is only counted when
//! `total_count` (or `page_info`) is actually requested. Edges carry opaque
//! offset cursors.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sqlx::SqlitePool;
use tokio::sync::OnceCell;

use crate::error::PaginationError;
use crate::orm::{Record, SelectQuery};

/// Information about pagination in a connection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageInfo {
    /// Are there rows after this page?
    pub has_next_page: bool,
    /// Are there rows before this page?
    pub has_previous_page: bool,
    /// Cursor of the first item in this page
    pub start_cursor: Option<String>,
    /// Cursor of the last item in this page
    pub end_cursor: Option<String>,
}

/// An edge in a connection, containing a row and cursor
#[derive(Debug, Clone)]
pub struct Edge {
    pub node: Record,
    pub cursor: String,
}

/// One page of a list query
#[derive(Debug)]
pub struct ListPage {
    records: Vec<Record>,
    offset: i64,
    unpaginated: SelectQuery,
    pool: SqlitePool,
    total: OnceCell<i64>,
}

impl ListPage {
    /// Run `query` with the given pagination.
    pub async fn load(
        pool: &SqlitePool,
        query: SelectQuery,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> crate::Result<Self> {
        check_non_negative("limit", limit)?;
        check_non_negative("offset", offset)?;

        let unpaginated = query.clone().clear_pagination();
        let mut paged = query;
        if let Some(limit) = limit {
            paged = paged.limit(limit);
        }
        if let Some(offset) = offset {
            paged = paged.offset(offset);
        }

        let records = paged.fetch_all(pool).await?;
        Ok(Self {
            records,
            offset: offset.unwrap_or(0),
            unpaginated,
            pool: pool.clone(),
            total: OnceCell::new(),
        })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Count of all rows matching the filters, ignoring pagination.
    ///
    /// Runs a second query on first call; later calls reuse the result.
    pub async fn total_count(&self) -> Result<i64, sqlx::Error> {
        self.total
            .get_or_try_init(|| self.unpaginated.count(&self.pool))
            .await
            .copied()
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, node)| Edge {
                cursor: encode_cursor(self.offset + i as i64),
                node: node.clone(),
            })
            .collect()
    }

    pub async fn page_info(&self) -> Result<PageInfo, sqlx::Error> {
        let total = self.total_count().await?;
        Ok(PageInfo {
            has_next_page: (self.offset + self.records.len() as i64) < total,
            has_previous_page: self.offset > 0,
            start_cursor: (!self.records.is_empty()).then(|| encode_cursor(self.offset)),
            end_cursor: self
                .records
                .len()
                .checked_sub(1)
                .map(|last| encode_cursor(self.offset + last as i64)),
        })
    }
}

fn check_non_negative(name: &'static str, value: Option<i64>) -> Result<(), PaginationError> {
    match value {
        Some(value) if value < 0 => Err(PaginationError::Negative { name, value }),
        _ => Ok(()),
    }
}

/// Encode an offset as a cursor string
pub fn encode_cursor(offset: i64) -> String {
    BASE64.encode(format!("cursor:{}", offset))
}

/// Decode a cursor string to an offset
pub fn decode_cursor(cursor: &str) -> Result<i64, PaginationError> {
    let decoded = BASE64
        .decode(cursor)
        .map_err(|_| PaginationError::InvalidCursor("invalid cursor format"))?;

    let s = String::from_utf8(decoded)
        .map_err(|_| PaginationError::InvalidCursor("invalid cursor encoding"))?;

    let Some(offset) = s.strip_prefix("cursor:") else {
        return Err(PaginationError::InvalidCursor("invalid cursor prefix"));
    };

    offset
        .parse()
        .map_err(|_| PaginationError::InvalidCursor("invalid cursor value"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;

    use super::*;
    use crate::db::{Database, sync_catalog};
    use crate::orm::{ColumnDef, ColumnType, ModelCatalog, ModelDef};

    #[test]
    fn test_cursor_roundtrip() {
        for offset in [0, 1, 100, 999999] {
            let cursor = encode_cursor(offset);
            let decoded = decode_cursor(&cursor).unwrap();
            assert_eq!(offset, decoded);
        }
    }

    #[test]
    fn test_invalid_cursor() {
        assert!(decode_cursor("not-valid-base64!!!").is_err());
        assert!(decode_cursor(&BASE64.encode("wrong:1")).is_err());
    }

    async fn seeded(rows: usize) -> (Database, Arc<ModelDef>) {
        let catalog = ModelCatalog::builder()
            .model_def(
                ModelDef::new("Item")
                    .column(ColumnDef::new("id", ColumnType::Integer).primary_key())
                    .column(ColumnDef::new("name", ColumnType::String)),
            )
            .build()
            .unwrap();
        let db = Database::in_memory().await.unwrap();
        sync_catalog(db.pool(), &catalog).await;
        for i in 0..rows {
            sqlx::query("INSERT INTO item (name) VALUES (?)")
                .bind(format!("item-{i}"))
                .execute(db.pool())
                .await
                .unwrap();
        }
        let model = Arc::clone(catalog.get("Item").unwrap());
        (db, model)
    }

    #[tokio::test]
    async fn test_page_with_total() {
        let (db, model) = seeded(3).await;
        let page = ListPage::load(db.pool(), SelectQuery::new(model), Some(1), Some(1))
            .await
            .unwrap();

        assert_eq!(page.records().len(), 1);
        assert_eq!(page.total_count().await.unwrap(), 3);

        let info = page.page_info().await.unwrap();
        assert!(info.has_next_page);
        assert!(info.has_previous_page);
        assert_eq!(info.start_cursor, Some(encode_cursor(1)));
        assert_eq!(info.end_cursor, Some(encode_cursor(1)));
        assert_eq!(page.edges()[0].cursor, encode_cursor(1));
    }

    #[tokio::test]
    async fn test_empty_page() {
        let (db, model) = seeded(2).await;
        let page = ListPage::load(db.pool(), SelectQuery::new(model), None, Some(5))
            .await
            .unwrap();
        assert!(page.records().is_empty());
        let info = page.page_info().await.unwrap();
        assert!(!info.has_next_page);
        assert_eq!(info.start_cursor, None);
    }

    #[tokio::test]
    async fn test_rejects_negative_arguments() {
        let (db, model) = seeded(0).await;
        let err = ListPage::load(db.pool(), SelectQuery::new(model), Some(-1), None)
            .await
            .unwrap_err();
        assert_matches!(
            err,
            crate::Error::Pagination(PaginationError::Negative { name: "limit", .. })
        );
    }
}

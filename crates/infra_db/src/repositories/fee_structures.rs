//! Fee structure repository
//!
//! A structure is one `fee_structures` row plus its ordered `fee_items`.
//! Items are keyed by position and are always rewritten as a whole.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use core_kernel::FeeStructureId;
use domain_billing::{FeeItem, FeeStructure, FeeStructureKey};

use super::{decode, money};
use crate::error::DatabaseError;

const SELECT_STRUCTURE: &str = r#"
    SELECT id, academic_term, department, student_category, per_credit_rate,
           status, created_at, updated_at
    FROM fee_structures
"#;

#[derive(Debug, FromRow)]
struct FeeStructureRow {
    id: Uuid,
    academic_term: String,
    department: String,
    student_category: String,
    per_credit_rate: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct FeeItemRow {
    fee_structure_id: Uuid,
    name: String,
    amount: Decimal,
    kind: String,
    mandatory: bool,
    refundable: bool,
}

impl FeeItemRow {
    fn into_domain(self) -> Result<FeeItem, DatabaseError> {
        Ok(FeeItem {
            name: self.name,
            amount: money(self.amount),
            kind: decode("fee_items.kind", &self.kind)?,
            mandatory: self.mandatory,
            refundable: self.refundable,
        })
    }
}

impl FeeStructureRow {
    fn into_domain(self, items: Vec<FeeItem>) -> Result<FeeStructure, DatabaseError> {
        Ok(FeeStructure {
            id: FeeStructureId::from_uuid(self.id),
            key: FeeStructureKey {
                academic_term: self.academic_term,
                department: self.department,
                student_category: self.student_category,
            },
            per_credit_rate: money(self.per_credit_rate),
            status: decode("fee_structures.status", &self.status)?,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Repository for the fee catalog
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeStructureRepository;

impl FeeStructureRepository {
    /// Finds the structure with the given key
    pub async fn find_by_key(
        conn: &mut PgConnection,
        key: &FeeStructureKey,
    ) -> Result<Option<FeeStructure>, DatabaseError> {
        let sql = format!("{SELECT_STRUCTURE} WHERE academic_term = $1 AND department = $2 AND student_category = $3");
        let row = sqlx::query_as::<_, FeeStructureRow>(&sql)
            .bind(&key.academic_term)
            .bind(&key.department)
            .bind(&key.student_category)
            .fetch_optional(&mut *conn)
            .await?;
        Self::hydrate_one(conn, row).await
    }

    pub async fn get(conn: &mut PgConnection, id: FeeStructureId) -> Result<Option<FeeStructure>, DatabaseError> {
        let sql = format!("{SELECT_STRUCTURE} WHERE id = $1");
        let row = sqlx::query_as::<_, FeeStructureRow>(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *conn)
            .await?;
        Self::hydrate_one(conn, row).await
    }

    /// Lists every structure in creation order
    pub async fn list(conn: &mut PgConnection) -> Result<Vec<FeeStructure>, DatabaseError> {
        let sql = format!("{SELECT_STRUCTURE} ORDER BY created_at, id");
        let rows = sqlx::query_as::<_, FeeStructureRow>(&sql)
            .fetch_all(&mut *conn)
            .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = Self::load_items(conn, &ids).await?;

        rows.into_iter()
            .map(|row| {
                let own = items.remove(&row.id).unwrap_or_default();
                row.into_domain(own)
            })
            .collect()
    }

    pub async fn insert(conn: &mut PgConnection, structure: &FeeStructure) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO fee_structures (
                id, academic_term, department, student_category, per_credit_rate,
                status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(*structure.id.as_uuid())
        .bind(&structure.key.academic_term)
        .bind(&structure.key.department)
        .bind(&structure.key.student_category)
        .bind(structure.per_credit_rate.amount())
        .bind(structure.status.as_str())
        .bind(structure.created_at)
        .bind(structure.updated_at)
        .execute(&mut *conn)
        .await?;

        Self::insert_items(conn, structure).await
    }

    /// Updates rate and status and rewrites the item list
    pub async fn replace(conn: &mut PgConnection, structure: &FeeStructure) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE fee_structures
            SET per_credit_rate = $2, status = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(*structure.id.as_uuid())
        .bind(structure.per_credit_rate.amount())
        .bind(structure.status.as_str())
        .bind(structure.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("FeeStructure", structure.id));
        }

        sqlx::query("DELETE FROM fee_items WHERE fee_structure_id = $1")
            .bind(*structure.id.as_uuid())
            .execute(&mut *conn)
            .await?;
        Self::insert_items(conn, structure).await
    }

    /// Deletes a structure; its items go with it
    pub async fn delete(conn: &mut PgConnection, id: FeeStructureId) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM fee_structures WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_items(conn: &mut PgConnection, structure: &FeeStructure) -> Result<(), DatabaseError> {
        for (position, item) in structure.items.iter().enumerate() {
            let position = i32::try_from(position).map_err(|e| DatabaseError::column("fee_items.position", e))?;
            sqlx::query(
                r#"
                INSERT INTO fee_items (
                    fee_structure_id, position, name, amount, kind, mandatory, refundable
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(*structure.id.as_uuid())
            .bind(position)
            .bind(&item.name)
            .bind(item.amount.amount())
            .bind(item.kind.as_str())
            .bind(item.mandatory)
            .bind(item.refundable)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    async fn load_items(
        conn: &mut PgConnection,
        structure_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<FeeItem>>, DatabaseError> {
        let rows = sqlx::query_as::<_, FeeItemRow>(
            r#"
            SELECT fee_structure_id, name, amount, kind, mandatory, refundable
            FROM fee_items
            WHERE fee_structure_id = ANY($1)
            ORDER BY fee_structure_id, position
            "#,
        )
        .bind(structure_ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<FeeItem>> = HashMap::new();
        for row in rows {
            let owner = row.fee_structure_id;
            grouped.entry(owner).or_default().push(row.into_domain()?);
        }
        Ok(grouped)
    }

    async fn hydrate_one(
        conn: &mut PgConnection,
        row: Option<FeeStructureRow>,
    ) -> Result<Option<FeeStructure>, DatabaseError> {
        let Some(row) = row else {
            return Ok(None);
        };
        let mut items = Self::load_items(conn, &[row.id]).await?;
        let own = items.remove(&row.id).unwrap_or_default();
        row.into_domain(own).map(Some)
    }
}

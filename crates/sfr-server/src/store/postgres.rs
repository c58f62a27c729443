//! PostgreSQL store implementation
//!
//! Runtime-checked queries against the existing warehouse schema
//! (`paquetes`, `sacos`, `distritos`, `historial_paquetes`). The schema is
//! owned and migrated elsewhere; this crate only reads and writes it.
//!
//! All data operations require an open transaction, per the
//! [`super::ParcelStore`] contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::str::FromStr;

use super::model::{
    Bag, District, ManifestUpdate, NewParcel, NewTransition, Parcel, TransitionRecord,
};
use super::{ParcelStore, StoreError, StoreResult};
use sfr_common::{ParcelState, ReturnSubtype};

const PARCEL_COLUMNS: &str = r#"
    id, tracking_code, estado AS state, devolucion_subtipo AS return_subtype,
    saco_id AS bag_id, distrito_id AS district_id,
    recipient_name, recipient_address, recipient_phone,
    merchandise_value AS declared_value, content_description,
    observaciones AS observations, responsable_consolidado AS manifest_responsible,
    received_at, delivered_at, returned_at, last_state_change_at,
    status_externo AS external_status, status_externo_at AS external_status_at,
    cambio_en_sistema_por AS last_changed_by
"#;

/// PostgreSQL-backed [`ParcelStore`].
pub struct PgParcelStore {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgParcelStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, tx: None }
    }

    fn tx(&mut self) -> StoreResult<&mut Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| StoreError::Transaction("no open transaction".into()))
    }
}

#[async_trait]
impl ParcelStore for PgParcelStore {
    async fn begin(&mut self) -> StoreResult<()> {
        if self.tx.is_some() {
            return Err(StoreError::Transaction("transaction already open".into()));
        }
        self.tx = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        match self.tx.take() {
            Some(tx) => {
                tx.commit().await?;
                Ok(())
            },
            None => Err(StoreError::Transaction(
                "no open transaction to commit".into(),
            )),
        }
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        match self.tx.take() {
            Some(tx) => {
                tx.rollback().await?;
                Ok(())
            },
            None => Err(StoreError::Transaction(
                "no open transaction to roll back".into(),
            )),
        }
    }

    async fn find_by_tracking_code(&mut self, tracking: &str) -> StoreResult<Option<Parcel>> {
        let tx = self.tx()?;
        let sql = format!("SELECT {PARCEL_COLUMNS} FROM paquetes WHERE tracking_code = $1");
        let row = sqlx::query_as::<_, ParcelRow>(&sql)
            .bind(tracking)
            .fetch_optional(&mut **tx)
            .await?;
        row.map(Parcel::try_from).transpose()
    }

    async fn exists_by_tracking_code(&mut self, tracking: &str) -> StoreResult<bool> {
        let tx = self.tx()?;
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM paquetes WHERE tracking_code = $1",
        )
        .bind(tracking)
        .fetch_one(&mut **tx)
        .await?;
        Ok(found > 0)
    }

    async fn insert_parcel(&mut self, parcel: NewParcel) -> StoreResult<Parcel> {
        let tx = self.tx()?;
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO paquetes
                (tracking_code, estado, devolucion_subtipo, saco_id, distrito_id,
                 received_at, last_state_change_at, cambio_en_sistema_por)
            VALUES ($1, $2, $3, $4, $5, $6, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&parcel.tracking_code)
        .bind(ParcelState::INITIAL.as_str())
        .bind(ReturnSubtype::default().as_str())
        .bind(parcel.bag_id)
        .bind(parcel.district_id)
        .bind(parcel.received_at)
        .bind(&parcel.changed_by)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| duplicate_or_db(e, &parcel.tracking_code))?;

        Ok(Parcel {
            id,
            tracking_code: parcel.tracking_code,
            state: ParcelState::INITIAL,
            return_subtype: ReturnSubtype::default(),
            bag_id: parcel.bag_id,
            district_id: parcel.district_id,
            recipient_name: None,
            recipient_address: None,
            recipient_phone: None,
            declared_value: None,
            content_description: None,
            observations: None,
            manifest_responsible: None,
            received_at: parcel.received_at,
            delivered_at: None,
            returned_at: None,
            last_state_change_at: parcel.received_at,
            external_status: None,
            external_status_at: None,
            last_changed_by: Some(parcel.changed_by),
        })
    }

    async fn update_parcel(&mut self, parcel: &Parcel) -> StoreResult<()> {
        let tx = self.tx()?;
        let result = sqlx::query(
            r#"
            UPDATE paquetes SET
                estado = $2, devolucion_subtipo = $3, saco_id = $4, distrito_id = $5,
                recipient_name = $6, recipient_address = $7, recipient_phone = $8,
                merchandise_value = $9, content_description = $10,
                observaciones = $11, responsable_consolidado = $12,
                received_at = $13, delivered_at = $14, returned_at = $15,
                last_state_change_at = $16,
                status_externo = $17, status_externo_at = $18,
                cambio_en_sistema_por = $19
            WHERE id = $1
            "#,
        )
        .bind(parcel.id)
        .bind(parcel.state.as_str())
        .bind(parcel.return_subtype.as_str())
        .bind(parcel.bag_id)
        .bind(parcel.district_id)
        .bind(&parcel.recipient_name)
        .bind(&parcel.recipient_address)
        .bind(&parcel.recipient_phone)
        .bind(parcel.declared_value)
        .bind(&parcel.content_description)
        .bind(&parcel.observations)
        .bind(&parcel.manifest_responsible)
        .bind(parcel.received_at)
        .bind(parcel.delivered_at)
        .bind(parcel.returned_at)
        .bind(parcel.last_state_change_at)
        .bind(&parcel.external_status)
        .bind(parcel.external_status_at)
        .bind(&parcel.last_changed_by)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "parcel '{}' not found",
                parcel.tracking_code
            )));
        }
        Ok(())
    }

    async fn batch_insert_ignore(&mut self, parcels: &[NewParcel]) -> StoreResult<Vec<String>> {
        let mut inserted = Vec::new();
        for parcel in parcels {
            let tx = self.tx()?;
            let tracking = sqlx::query_scalar::<_, String>(
                r#"
                INSERT INTO paquetes
                    (tracking_code, estado, devolucion_subtipo, saco_id, distrito_id,
                     received_at, last_state_change_at, cambio_en_sistema_por)
                VALUES ($1, $2, $3, $4, $5, $6, $6, $7)
                ON CONFLICT (tracking_code) DO NOTHING
                RETURNING tracking_code
                "#,
            )
            .bind(&parcel.tracking_code)
            .bind(ParcelState::INITIAL.as_str())
            .bind(ReturnSubtype::default().as_str())
            .bind(parcel.bag_id)
            .bind(parcel.district_id)
            .bind(parcel.received_at)
            .bind(&parcel.changed_by)
            .fetch_optional(&mut **tx)
            .await?;
            if let Some(tracking) = tracking {
                inserted.push(tracking);
            }
        }
        Ok(inserted)
    }

    async fn batch_update_manifest(&mut self, updates: &[ManifestUpdate]) -> StoreResult<()> {
        for update in updates {
            let tx = self.tx()?;
            sqlx::query(
                r#"
                UPDATE paquetes SET
                    saco_id = $2, distrito_id = $3, received_at = $4,
                    cambio_en_sistema_por = $5,
                    observaciones = COALESCE($6, observaciones),
                    responsable_consolidado = COALESCE($7, responsable_consolidado)
                WHERE tracking_code = $1
                "#,
            )
            .bind(&update.tracking_code)
            .bind(update.bag_id)
            .bind(update.district_id)
            .bind(update.received_at)
            .bind(&update.changed_by)
            .bind(&update.observations)
            .bind(&update.responsible)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn delete_parcels(&mut self, trackings: &[String]) -> StoreResult<u64> {
        let tx = self.tx()?;
        let result = sqlx::query("DELETE FROM paquetes WHERE tracking_code = ANY($1)")
            .bind(trackings)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_or_create_bag(&mut self, seal: &str) -> StoreResult<Bag> {
        let tx = self.tx()?;
        let (id, seal) = sqlx::query_as::<_, (i64, String)>(
            r#"
            INSERT INTO sacos (marchamo) VALUES ($1)
            ON CONFLICT (marchamo) DO UPDATE SET marchamo = EXCLUDED.marchamo
            RETURNING id, marchamo
            "#,
        )
        .bind(seal)
        .fetch_one(&mut **tx)
        .await?;
        Ok(Bag { id, seal })
    }

    async fn find_bag_by_seal(&mut self, seal: &str) -> StoreResult<Option<Bag>> {
        let tx = self.tx()?;
        let row = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, marchamo FROM sacos WHERE marchamo = $1",
        )
        .bind(seal)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.map(|(id, seal)| Bag { id, seal }))
    }

    async fn delete_bag(&mut self, bag_id: i64) -> StoreResult<()> {
        let tx = self.tx()?;
        let result = sqlx::query("DELETE FROM sacos WHERE id = $1")
            .bind(bag_id)
            .execute(&mut **tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("bag {bag_id} not found")));
        }
        Ok(())
    }

    async fn count_by_bag(&mut self, bag_id: i64) -> StoreResult<i64> {
        let tx = self.tx()?;
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM paquetes WHERE saco_id = $1")
                .bind(bag_id)
                .fetch_one(&mut **tx)
                .await?;
        Ok(count)
    }

    async fn find_or_create_district(&mut self, name: &str) -> StoreResult<District> {
        let tx = self.tx()?;
        let (id, name) = sqlx::query_as::<_, (i64, String)>(
            r#"
            INSERT INTO distritos (nombre) VALUES ($1)
            ON CONFLICT (nombre) DO UPDATE SET nombre = EXCLUDED.nombre
            RETURNING id, nombre
            "#,
        )
        .bind(name)
        .fetch_one(&mut **tx)
        .await?;
        Ok(District { id, name })
    }

    async fn find_district_by_name(&mut self, name: &str) -> StoreResult<Option<District>> {
        let tx = self.tx()?;
        let row = sqlx::query_as::<_, (i64, String)>(
            "SELECT id, nombre FROM distritos WHERE nombre = $1",
        )
        .bind(name)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.map(|(id, name)| District { id, name }))
    }

    async fn append_transition(&mut self, transition: NewTransition) -> StoreResult<()> {
        let tx = self.tx()?;
        sqlx::query(
            r#"
            INSERT INTO historial_paquetes
                (paquete_id, estado_from, estado_to, changed_at, motivo, changed_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(transition.parcel_id)
        .bind(transition.from_state.map(|s| s.as_str()))
        .bind(transition.to_state.as_str())
        .bind(transition.changed_at)
        .bind(&transition.motive)
        .bind(&transition.changed_by)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn transitions_for_parcel(
        &mut self,
        parcel_id: i64,
    ) -> StoreResult<Vec<TransitionRecord>> {
        let tx = self.tx()?;
        let rows = sqlx::query_as::<_, TransitionRow>(
            r#"
            SELECT id, paquete_id AS parcel_id, estado_from AS from_state,
                   estado_to AS to_state, changed_at, motivo AS motive, changed_by
            FROM historial_paquetes
            WHERE paquete_id = $1
            ORDER BY changed_at DESC, id DESC
            "#,
        )
        .bind(parcel_id)
        .fetch_all(&mut **tx)
        .await?;
        rows.into_iter().map(TransitionRecord::try_from).collect()
    }

    async fn purge_transitions(&mut self, parcel_ids: &[i64]) -> StoreResult<()> {
        let tx = self.tx()?;
        sqlx::query("DELETE FROM historial_paquetes WHERE paquete_id = ANY($1)")
            .bind(parcel_ids)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

fn duplicate_or_db(err: sqlx::Error, tracking: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate(format!("parcel '{tracking}' already exists"));
        }
    }
    StoreError::Database(err)
}

// Database row structures for runtime queries

#[derive(Debug, sqlx::FromRow)]
struct ParcelRow {
    id: i64,
    tracking_code: String,
    state: String,
    return_subtype: Option<String>,
    bag_id: i64,
    district_id: i64,
    recipient_name: Option<String>,
    recipient_address: Option<String>,
    recipient_phone: Option<String>,
    declared_value: Option<f64>,
    content_description: Option<String>,
    observations: Option<String>,
    manifest_responsible: Option<String>,
    received_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
    returned_at: Option<DateTime<Utc>>,
    last_state_change_at: DateTime<Utc>,
    external_status: Option<String>,
    external_status_at: Option<DateTime<Utc>>,
    last_changed_by: Option<String>,
}

impl TryFrom<ParcelRow> for Parcel {
    type Error = StoreError;

    fn try_from(row: ParcelRow) -> Result<Self, Self::Error> {
        let state = ParcelState::from_str(&row.state)
            .map_err(|e| StoreError::Corrupt(format!("parcel {}: {e}", row.tracking_code)))?;
        let return_subtype = match row.return_subtype.as_deref() {
            Some(code) => ReturnSubtype::from_str(code)
                .map_err(|e| StoreError::Corrupt(format!("parcel {}: {e}", row.tracking_code)))?,
            None => ReturnSubtype::default(),
        };
        Ok(Parcel {
            id: row.id,
            tracking_code: row.tracking_code,
            state,
            return_subtype,
            bag_id: row.bag_id,
            district_id: row.district_id,
            recipient_name: row.recipient_name,
            recipient_address: row.recipient_address,
            recipient_phone: row.recipient_phone,
            declared_value: row.declared_value,
            content_description: row.content_description,
            observations: row.observations,
            manifest_responsible: row.manifest_responsible,
            received_at: row.received_at,
            delivered_at: row.delivered_at,
            returned_at: row.returned_at,
            last_state_change_at: row.last_state_change_at,
            external_status: row.external_status,
            external_status_at: row.external_status_at,
            last_changed_by: row.last_changed_by,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransitionRow {
    id: i64,
    parcel_id: i64,
    from_state: Option<String>,
    to_state: String,
    changed_at: DateTime<Utc>,
    motive: Option<String>,
    changed_by: String,
}

impl TryFrom<TransitionRow> for TransitionRecord {
    type Error = StoreError;

    fn try_from(row: TransitionRow) -> Result<Self, Self::Error> {
        let from_state = row
            .from_state
            .as_deref()
            .map(ParcelState::from_str)
            .transpose()
            .map_err(|e| StoreError::Corrupt(format!("ledger entry {}: {e}", row.id)))?;
        let to_state = ParcelState::from_str(&row.to_state)
            .map_err(|e| StoreError::Corrupt(format!("ledger entry {}: {e}", row.id)))?;
        Ok(TransitionRecord {
            id: row.id,
            parcel_id: row.parcel_id,
            from_state,
            to_state,
            changed_at: row.changed_at,
            motive: row.motive,
            changed_by: row.changed_by,
        })
    }
}

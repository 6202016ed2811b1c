//! PostgreSQL implementation of the record store.
//!
//! Addresses, hashes and log payloads are stored as lowercase hex text;
//! unix-second timestamps are stored as `BIGINT`. Expected tables:
//! `records`, `events`, `devices` (see `schema.sql`).

use alloy::primitives::{Address, B256, Bytes};
use async_trait::async_trait;
use sqlx::PgPool;
use std::str::FromStr;
use uuid::Uuid;

use super::{RecordStore, RecordWithEvents};
use crate::domain::{AuditEvent, Device, EventType, PermitSignature, Record, RecordId};
use crate::error::RelayerError;

/// PostgreSQL-backed [`RecordStore`] using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

type RecordRow = (Uuid, String, i64, i64, Option<i64>, Option<i16>, Option<String>, Option<String>);
type EventRow = (Uuid, String, String, String, i64, i64, String, String, Vec<String>);

impl PostgresStore {
    /// Creates a store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn events_for(&self, record_id: RecordId) -> Result<Vec<AuditEvent>, RelayerError> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT record_id, event_type, transaction_hash, block_hash, block_number, \
             log_index, address, data, topics FROM events WHERE record_id = $1",
        )
        .bind(record_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RelayerError::Storage(e.to_string()))?;

        rows.into_iter().map(event_from_row).collect()
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn insert_record(&self, record: Record) -> Result<Record, RelayerError> {
        sqlx::query(
            "INSERT INTO records (id, device_address, value, timestamp, permit_deadline, \
             permit_v, permit_r, permit_s) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(record.id.as_uuid())
        .bind(hex_address(record.device_address))
        .bind(record.value)
        .bind(to_db_time(record.timestamp)?)
        .bind(record.permit_deadline.map(to_db_time).transpose()?)
        .bind(record.permit_signature.as_ref().map(|s| i16::from(s.v)))
        .bind(record.permit_signature.as_ref().map(|s| format!("{}", s.r)))
        .bind(record.permit_signature.as_ref().map(|s| format!("{}", s.s)))
        .execute(&self.pool)
        .await
        .map_err(|e| RelayerError::Storage(e.to_string()))?;

        Ok(record)
    }

    async fn store_permit(
        &self,
        record_id: RecordId,
        deadline: u64,
        signature: PermitSignature,
    ) -> Result<(), RelayerError> {
        let updated = sqlx::query(
            "UPDATE records SET permit_deadline = $2, permit_v = $3, permit_r = $4, \
             permit_s = $5 WHERE id = $1",
        )
        .bind(record_id.as_uuid())
        .bind(to_db_time(deadline)?)
        .bind(i16::from(signature.v))
        .bind(format!("{}", signature.r))
        .bind(format!("{}", signature.s))
        .execute(&self.pool)
        .await
        .map_err(|e| RelayerError::Storage(e.to_string()))?;

        if updated.rows_affected() == 0 {
            return Err(RelayerError::Storage(format!(
                "record {record_id} not found"
            )));
        }
        Ok(())
    }

    async fn unaudited_records(
        &self,
        max_count: usize,
        now: u64,
    ) -> Result<Vec<Record>, RelayerError> {
        let rows = sqlx::query_as::<_, RecordRow>(
            "SELECT id, device_address, value, timestamp, permit_deadline, permit_v, \
             permit_r, permit_s FROM ( \
                 SELECT DISTINCT ON (device_address) * FROM records r \
                 WHERE (r.permit_deadline IS NULL OR r.permit_deadline > $1) \
                   AND NOT EXISTS (SELECT 1 FROM events e WHERE e.record_id = r.id) \
                 ORDER BY device_address, timestamp ASC \
             ) oldest_per_device \
             ORDER BY timestamp ASC LIMIT $2",
        )
        .bind(to_db_time(now)?)
        .bind(i64::try_from(max_count).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RelayerError::Storage(e.to_string()))?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn insert_events(&self, events: &[AuditEvent]) -> Result<(), RelayerError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RelayerError::Storage(e.to_string()))?;

        for event in events {
            sqlx::query(
                "INSERT INTO events (record_id, event_type, transaction_hash, block_hash, \
                 block_number, log_index, address, data, topics) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(event.record_id.as_uuid())
            .bind(event.event_type.as_str())
            .bind(format!("{}", event.transaction_hash))
            .bind(format!("{}", event.block_hash))
            .bind(to_db_time(event.block_number)?)
            .bind(to_db_time(event.log_index)?)
            .bind(hex_address(event.address))
            .bind(format!("{}", event.data))
            .bind(
                event
                    .topics
                    .iter()
                    .map(|t| format!("{t}"))
                    .collect::<Vec<String>>(),
            )
            .execute(&mut *tx)
            .await
            .map_err(|e| RelayerError::Storage(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| RelayerError::Storage(e.to_string()))
    }

    async fn has_pending_record(&self, device: Address, now: u64) -> Result<bool, RelayerError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS ( \
                 SELECT 1 FROM records r \
                 WHERE r.device_address = $1 \
                   AND (r.permit_deadline IS NULL OR r.permit_deadline > $2) \
                   AND NOT EXISTS (SELECT 1 FROM events e WHERE e.record_id = r.id) \
             )",
        )
        .bind(hex_address(device))
        .bind(to_db_time(now)?)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RelayerError::Storage(e.to_string()))
    }

    async fn last_successful_audit(
        &self,
        device: Address,
        now: u64,
    ) -> Result<Option<AuditEvent>, RelayerError> {
        let row = sqlx::query_as::<_, EventRow>(
            "SELECT e.record_id, e.event_type, e.transaction_hash, e.block_hash, \
             e.block_number, e.log_index, e.address, e.data, e.topics \
             FROM events e JOIN records r ON r.id = e.record_id \
             WHERE r.device_address = $1 \
               AND (r.permit_deadline IS NULL OR r.permit_deadline > $2) \
               AND e.event_type = 'SubcallSucceeded' \
             ORDER BY r.timestamp DESC LIMIT 1",
        )
        .bind(hex_address(device))
        .bind(to_db_time(now)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RelayerError::Storage(e.to_string()))?;

        row.map(event_from_row).transpose()
    }

    async fn records_with_events(
        &self,
        device: Option<Address>,
    ) -> Result<Vec<RecordWithEvents>, RelayerError> {
        let rows = if let Some(device) = device {
            sqlx::query_as::<_, RecordRow>(
                "SELECT id, device_address, value, timestamp, permit_deadline, permit_v, \
                 permit_r, permit_s FROM records WHERE device_address = $1 \
                 ORDER BY timestamp DESC",
            )
            .bind(hex_address(device))
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, RecordRow>(
                "SELECT id, device_address, value, timestamp, permit_deadline, permit_v, \
                 permit_r, permit_s FROM records ORDER BY timestamp DESC",
            )
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| RelayerError::Storage(e.to_string()))?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let record = record_from_row(row)?;
            let events = self.events_for(record.id).await?;
            result.push(RecordWithEvents { record, events });
        }
        Ok(result)
    }

    async fn expired_unaudited_count(&self, now: u64) -> Result<u64, RelayerError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM records r \
             WHERE r.permit_deadline IS NOT NULL AND r.permit_deadline <= $1 \
               AND NOT EXISTS (SELECT 1 FROM events e WHERE e.record_id = r.id)",
        )
        .bind(to_db_time(now)?)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RelayerError::Storage(e.to_string()))?;
        Ok(count.unsigned_abs())
    }

    async fn insert_device(&self, device: Device) -> Result<(), RelayerError> {
        sqlx::query(
            "INSERT INTO devices (address, auditor_address) VALUES ($1, $2) \
             ON CONFLICT (address) DO UPDATE SET auditor_address = EXCLUDED.auditor_address",
        )
        .bind(hex_address(device.address))
        .bind(hex_address(device.auditor_address))
        .execute(&self.pool)
        .await
        .map_err(|e| RelayerError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn find_device(&self, address: Address) -> Result<Option<Device>, RelayerError> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT address, auditor_address FROM devices WHERE address = $1",
        )
        .bind(hex_address(address))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RelayerError::Storage(e.to_string()))?;

        row.map(|(address, auditor)| {
            Ok(Device::new(parse_address(&address)?, parse_address(&auditor)?))
        })
        .transpose()
    }

    async fn list_devices(&self) -> Result<Vec<Device>, RelayerError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT address, auditor_address FROM devices ORDER BY address",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RelayerError::Storage(e.to_string()))?;

        rows.into_iter()
            .map(|(address, auditor)| {
                Ok(Device::new(parse_address(&address)?, parse_address(&auditor)?))
            })
            .collect()
    }
}

fn hex_address(address: Address) -> String {
    format!("{address:#x}")
}

fn parse_address(s: &str) -> Result<Address, RelayerError> {
    Address::from_str(s).map_err(|e| RelayerError::Storage(format!("bad address {s}: {e}")))
}

fn parse_b256(s: &str) -> Result<B256, RelayerError> {
    B256::from_str(s).map_err(|e| RelayerError::Storage(format!("bad hash {s}: {e}")))
}

fn to_db_time(value: u64) -> Result<i64, RelayerError> {
    i64::try_from(value).map_err(|_| RelayerError::Storage(format!("value {value} overflows BIGINT")))
}

fn from_db_time(value: i64) -> u64 {
    value.unsigned_abs()
}

fn record_from_row(row: RecordRow) -> Result<Record, RelayerError> {
    let (id, device_address, value, timestamp, permit_deadline, permit_v, permit_r, permit_s) = row;

    let permit_signature = match (permit_v, permit_r, permit_s) {
        (Some(v), Some(r), Some(s)) => Some(PermitSignature {
            v: u8::try_from(v).map_err(|_| RelayerError::Storage(format!("bad permit v {v}")))?,
            r: parse_b256(&r)?,
            s: parse_b256(&s)?,
        }),
        _ => None,
    };

    Ok(Record {
        id: RecordId::from_uuid(id),
        device_address: parse_address(&device_address)?,
        value,
        timestamp: from_db_time(timestamp),
        permit_deadline: permit_deadline.map(from_db_time),
        permit_signature,
    })
}

fn event_from_row(row: EventRow) -> Result<AuditEvent, RelayerError> {
    let (record_id, event_type, tx_hash, block_hash, block_number, log_index, address, data, topics) =
        row;

    let data = Bytes::from_str(&data)
        .map_err(|e| RelayerError::Storage(format!("bad log data: {e}")))?;

    Ok(AuditEvent {
        record_id: RecordId::from_uuid(record_id),
        event_type: EventType::from_str_lossy(&event_type),
        transaction_hash: parse_b256(&tx_hash)?,
        block_hash: parse_b256(&block_hash)?,
        block_number: from_db_time(block_number),
        log_index: from_db_time(log_index),
        address: parse_address(&address)?,
        data,
        topics: topics
            .iter()
            .map(|t| parse_b256(t))
            .collect::<Result<Vec<B256>, RelayerError>>()?,
    })
}

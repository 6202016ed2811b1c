//! Request and response DTOs for the REST API.

pub mod device_dto;
pub mod record_dto;

pub use device_dto::{AuditStatusResponse, DeviceDto, RegisterAuditorRequest, RegisterDeviceRequest};
pub use record_dto::{CreateRecordRequest, EventDto, RecordResponse};

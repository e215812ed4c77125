// Runs the armed operations against one device, in fixed priority order:
// queries, the destructive request, maintenance, then progress.

use super::{OperationRecord, ReportPayload};
use crate::config::{ArmedOperations, DestructiveOperationRequest, MaintenanceOperation, QueryOperation};
use crate::transport::{DeviceHandle, DeviceTransport, ProgressKind};
use crate::DeviceResult;

pub fn dispatch(
    transport: &dyn DeviceTransport,
    device: &DeviceHandle,
    operations: &ArmedOperations,
) -> Vec<OperationRecord> {
    let mut records = Vec::new();

    // BTreeSet iteration follows the declaration order of QueryOperation
    for query in &operations.queries {
        records.push(record(device, query.name(), run_query(transport, device, query)));
    }

    if let Some(request) = &operations.destructive {
        let result = run_destructive(transport, device, request).map(|()| None);
        records.push(record(device, request.name().to_string(), result));
    }

    for operation in &operations.maintenance {
        let result = run_maintenance(transport, device, *operation).map(|()| None);
        records.push(record(device, operation.name().to_string(), result));
    }

    if let Some(kind) = operations.progress {
        let result = transport
            .progress(device, kind)
            .map(|p| Some(ReportPayload::Progress(p)));
        records.push(record(device, progress_name(kind), result));
    }

    records
}

fn progress_name(kind: ProgressKind) -> String {
    format!("{} progress", kind)
}

fn record(
    device: &DeviceHandle,
    operation: String,
    result: DeviceResult<Option<ReportPayload>>,
) -> OperationRecord {
    match result {
        Ok(report) => {
            tracing::info!(device = %device.path, operation = %operation, "Operation succeeded");
            OperationRecord::success(operation, report)
        }
        Err(e) => {
            tracing::warn!(device = %device.path, operation = %operation, error = %e, "Operation failed");
            OperationRecord::failure(operation, &e)
        }
    }
}

fn run_query(
    transport: &dyn DeviceTransport,
    device: &DeviceHandle,
    query: &QueryOperation,
) -> DeviceResult<Option<ReportPayload>> {
    let payload = match query {
        QueryOperation::DeviceInfo => ReportPayload::Fields(transport.device_information(device)?),
        QueryOperation::LowLevelInfo => ReportPayload::Fields(transport.low_level_info(device)?),
        QueryOperation::TestUnitReady => ReportPayload::Readiness(transport.test_unit_ready(device)?),
        QueryOperation::DisplayLba(lba) => ReportPayload::Sector {
            lba: *lba,
            bytes: transport.read_lba(device, *lba, 1)?,
        },
        QueryOperation::SupportedFormats => ReportPayload::Formats(transport.supported_formats(device)?),
        QueryOperation::FormatStatusLog => ReportPayload::Fields(transport.format_status(device)?),
        QueryOperation::PhysicalElementStatus => {
            ReportPayload::Elements(transport.physical_elements(device)?)
        }
        QueryOperation::SmartAttributes => ReportPayload::Smart(transport.smart_attributes(device)?),
        QueryOperation::DefectList(request) => {
            ReportPayload::Defects(transport.defect_list(device, request)?)
        }
        QueryOperation::DeviceStatistics => {
            ReportPayload::Statistics(transport.device_statistics(device)?)
        }
        QueryOperation::ConcurrentRanges => ReportPayload::Ranges(transport.concurrent_ranges(device)?),
        QueryOperation::SataPhyEvents => ReportPayload::PhyEvents(transport.sata_phy_events(device)?),
    };
    Ok(Some(payload))
}

fn run_destructive(
    transport: &dyn DeviceTransport,
    device: &DeviceHandle,
    request: &DestructiveOperationRequest,
) -> DeviceResult<()> {
    tracing::info!(device = %device.path, operation = request.name(), "Starting destructive operation");
    match request {
        DestructiveOperationRequest::FormatUnit(params) => transport.format_unit(device, params),
        DestructiveOperationRequest::SetSectorSize { sector_size } => {
            transport.set_sector_size(device, *sector_size)
        }
        DestructiveOperationRequest::RemovePhysicalElement { element_id } => {
            transport.remove_physical_element(device, *element_id)
        }
        DestructiveOperationRequest::RepopulateElements => {
            transport.repopulate_physical_elements(device)
        }
        DestructiveOperationRequest::NvmFormat(params) => transport.nvm_format(device, params),
    }
}

fn run_maintenance(
    transport: &dyn DeviceTransport,
    device: &DeviceHandle,
    operation: MaintenanceOperation,
) -> DeviceResult<()> {
    match operation {
        MaintenanceOperation::ReinitPhyEvents => transport.reinitialize_phy_events(device),
        MaintenanceOperation::ReinitDeviceStatistics => {
            transport.reinitialize_device_statistics(device)
        }
    }
}

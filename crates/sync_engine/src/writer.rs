//! Copy the samples selected for a round into the bound outputs.

use std::collections::BTreeSet;

use contracts::{
    FrameBuffer, ImageLayout, SharedFrameOutput, SharedMatrixOutput, TimelineId, TimelineKind,
    Timestamp,
};
use tracing::{debug, error, trace, warn};

use crate::attachments::Attachments;
use crate::binding::{BindingTable, OutputBinding};
use crate::delay::DelayTable;
use crate::selector::InclusionSet;

/// What a round wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct WriteReport {
    pub frames_written: usize,
    pub matrices_written: usize,
    pub lookup_misses: usize,
    /// Matrix slots whose timeline was included but whose element was not
    /// written; their synchronized status is left as is for this round
    pub unevaluated_matrix_slots: BTreeSet<usize>,
}

/// Write every binding fed by an included timeline
pub(crate) fn write_round(
    instant: Timestamp,
    included: &InclusionSet,
    attachments: &Attachments,
    bindings: &BindingTable,
    delays: &DelayTable,
) -> WriteReport {
    let mut report = WriteReport::default();

    for &index in included.indices(TimelineKind::Frame) {
        write_frame_timeline(instant, index, attachments, bindings, delays, &mut report);
    }
    for &index in included.indices(TimelineKind::Matrix) {
        write_matrix_timeline(instant, index, attachments, bindings, delays, &mut report);
    }

    report
}

fn write_frame_timeline(
    instant: Timestamp,
    index: usize,
    attachments: &Attachments,
    bindings: &BindingTable,
    delays: &DelayTable,
    report: &mut WriteReport,
) {
    let id = TimelineId::frame(index);
    let query = delays.query_timestamp(id, instant);

    let Some(timeline) = attachments.frame_timeline(index) else {
        lookup_miss(attachments, id, query, report);
        return;
    };
    let Some(buffer) = timeline.closest_buffer(query) else {
        lookup_miss(attachments, id, query, report);
        return;
    };

    let layout = match ImageLayout::from_geometry(&timeline.geometry()) {
        Ok(layout) => layout,
        Err(e) => {
            error!(
                timeline = %attachments.label(id),
                error = %e,
                "unsupported frame geometry, bindings skipped"
            );
            return;
        }
    };

    for binding in bindings.targeting(TimelineKind::Frame, index) {
        let Some(output) = attachments.frame_outputs.get(binding.slot) else {
            continue;
        };
        if write_frame_slot(instant, id, &layout, &buffer, binding, output, attachments) {
            report.frames_written += 1;
        }
    }
}

fn write_frame_slot(
    instant: Timestamp,
    id: TimelineId,
    layout: &ImageLayout,
    buffer: &FrameBuffer,
    binding: &OutputBinding,
    output: &SharedFrameOutput,
    attachments: &Attachments,
) -> bool {
    let Some(element) = buffer.element(binding.element_index) else {
        warn!(
            timeline = %attachments.label(id),
            slot = binding.slot,
            element = binding.element_index,
            timestamp = buffer.timestamp,
            "frame element absent from buffer"
        );
        return false;
    };

    let mut output = output.lock();
    if output.layout().as_ref() != Some(layout) {
        debug!(
            slot = binding.slot,
            width = layout.width,
            height = layout.height,
            format = ?layout.pixel_format,
            "reallocating frame output"
        );
        output.reallocate(*layout);
    }

    if let Err(e) = output.write_pixels(element) {
        error!(
            timeline = %attachments.label(id),
            slot = binding.slot,
            error = %e,
            "failed to copy frame element"
        );
        return false;
    }

    output.set_acquisition_time(instant);
    output.notify_modified();
    trace!(slot = binding.slot, timestamp = buffer.timestamp, "frame slot written");
    true
}

fn write_matrix_timeline(
    instant: Timestamp,
    index: usize,
    attachments: &Attachments,
    bindings: &BindingTable,
    delays: &DelayTable,
    report: &mut WriteReport,
) {
    let id = TimelineId::matrix(index);
    let query = delays.query_timestamp(id, instant);

    let buffer = attachments
        .matrix_timeline(index)
        .and_then(|timeline| timeline.closest_buffer(query));
    let Some(buffer) = buffer else {
        lookup_miss(attachments, id, query, report);
        report
            .unevaluated_matrix_slots
            .extend(bindings.targeting(TimelineKind::Matrix, index).map(|b| b.slot));
        return;
    };

    for binding in bindings.targeting(TimelineKind::Matrix, index) {
        let written = match (
            buffer.element(binding.element_index),
            attachments.matrix_outputs.get(binding.slot),
        ) {
            (Some(values), Some(output)) => {
                write_matrix_slot(values, output);
                true
            }
            _ => false,
        };

        if written {
            report.matrices_written += 1;
            trace!(slot = binding.slot, timestamp = buffer.timestamp, "matrix slot written");
        } else {
            report.unevaluated_matrix_slots.insert(binding.slot);
        }
    }
}

fn write_matrix_slot(values: &[f32; 16], output: &SharedMatrixOutput) {
    let mut output = output.lock();
    output.set_values(values);
    output.notify_modified();
}

fn lookup_miss(attachments: &Attachments, id: TimelineId, query: Timestamp, report: &mut WriteReport) {
    let label = attachments.label(id);
    error!(timeline = %label, timestamp = query, "no buffer found for timeline");
    observability::record_lookup_miss(&label);
    report.lookup_misses += 1;
}

//! Timeline handles and output destinations owned by a synchronizer.

use std::sync::{Arc, Weak};

use contracts::{
    FrameTimeline, MatrixTimeline, SharedFrameOutput, SharedMatrixOutput, SubscriptionId,
    SynchronizerConfig, TimelineCallback, TimelineId, TimelineKind, Timestamp,
};

use crate::selector::Candidate;

/// Weakly held timelines (absent when never attached or released) plus outputs
pub(crate) struct Attachments {
    frame_timelines: Vec<Option<Weak<dyn FrameTimeline>>>,
    matrix_timelines: Vec<Option<Weak<dyn MatrixTimeline>>>,
    pub(crate) frame_outputs: Vec<SharedFrameOutput>,
    pub(crate) matrix_outputs: Vec<SharedMatrixOutput>,
    labels: [Vec<String>; 2],
    subscriptions: Vec<(TimelineId, SubscriptionId)>,
}

impl Attachments {
    pub(crate) fn new(
        config: &SynchronizerConfig,
        frame_timelines: Vec<Option<Weak<dyn FrameTimeline>>>,
        matrix_timelines: Vec<Option<Weak<dyn MatrixTimeline>>>,
        frame_outputs: Vec<SharedFrameOutput>,
        matrix_outputs: Vec<SharedMatrixOutput>,
    ) -> Self {
        let labels = |kind: TimelineKind| -> Vec<String> {
            (0..config.timelines(kind).len())
                .map(|index| config.timeline_label(TimelineId::new(kind, index)))
                .collect()
        };

        Self {
            labels: [labels(TimelineKind::Frame), labels(TimelineKind::Matrix)],
            frame_timelines,
            matrix_timelines,
            frame_outputs,
            matrix_outputs,
            subscriptions: Vec::new(),
        }
    }

    /// Configured name of a timeline, falling back to its id
    pub(crate) fn label(&self, id: TimelineId) -> String {
        let labels = match id.kind {
            TimelineKind::Frame => &self.labels[0],
            TimelineKind::Matrix => &self.labels[1],
        };
        labels
            .get(id.index)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    pub(crate) fn frame_timeline(&self, index: usize) -> Option<Arc<dyn FrameTimeline>> {
        self.frame_timelines
            .get(index)
            .and_then(Option::as_ref)
            .and_then(Weak::upgrade)
    }

    pub(crate) fn matrix_timeline(&self, index: usize) -> Option<Arc<dyn MatrixTimeline>> {
        self.matrix_timelines
            .get(index)
            .and_then(Option::as_ref)
            .and_then(Weak::upgrade)
    }

    fn newest_timestamp(&self, id: TimelineId) -> Option<Timestamp> {
        match id.kind {
            TimelineKind::Frame => self.frame_timeline(id.index)?.newest_timestamp(),
            TimelineKind::Matrix => self.matrix_timeline(id.index)?.newest_timestamp(),
        }
    }

    fn subscribe(&self, id: TimelineId, callback: TimelineCallback) -> Option<SubscriptionId> {
        match id.kind {
            TimelineKind::Frame => Some(self.frame_timeline(id.index)?.subscribe(callback)),
            TimelineKind::Matrix => Some(self.matrix_timeline(id.index)?.subscribe(callback)),
        }
    }

    fn unsubscribe(&self, id: TimelineId, subscription: SubscriptionId) {
        match id.kind {
            TimelineKind::Frame => {
                if let Some(timeline) = self.frame_timeline(id.index) {
                    timeline.unsubscribe(subscription);
                }
            }
            TimelineKind::Matrix => {
                if let Some(timeline) = self.matrix_timeline(id.index) {
                    timeline.unsubscribe(subscription);
                }
            }
        }
    }

    fn ids(&self) -> impl Iterator<Item = TimelineId> + '_ {
        (0..self.frame_timelines.len())
            .map(TimelineId::frame)
            .chain((0..self.matrix_timelines.len()).map(TimelineId::matrix))
    }

    /// Newest timestamp of every live, non-empty timeline
    pub(crate) fn candidates(&self) -> Vec<Candidate> {
        self.ids()
            .filter_map(|id| {
                let timestamp = self.newest_timestamp(id)?;
                Some(Candidate::new(id, timestamp))
            })
            .collect()
    }

    /// Subscribe `callback` to every live timeline
    pub(crate) fn subscribe_all(&mut self, callback: TimelineCallback) -> usize {
        let ids: Vec<TimelineId> = self.ids().collect();
        for id in ids {
            if let Some(subscription) = self.subscribe(id, callback.clone()) {
                self.subscriptions.push((id, subscription));
            }
        }
        self.subscriptions.len()
    }

    /// Drop every subscription made by [`Attachments::subscribe_all`]
    pub(crate) fn unsubscribe_all(&mut self) {
        for (id, subscription) in std::mem::take(&mut self.subscriptions) {
            self.unsubscribe(id, subscription);
        }
    }

    /// Forget every timeline handle
    pub(crate) fn release_timelines(&mut self) {
        self.unsubscribe_all();
        self.frame_timelines.iter_mut().for_each(|t| *t = None);
        self.matrix_timelines.iter_mut().for_each(|t| *t = None);
    }
}

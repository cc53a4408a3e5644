//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟 e2e 测试（配置 -> 时间线 -> 同步器 -> 输出）

#[cfg(test)]
mod contract_tests {
    use contracts::SyncEvent;

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_value(SyncEvent::MatrixSlotSynchronized { slot: 2 }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "event": "matrix_slot_synchronized", "slot": 2 })
        );

        let done: SyncEvent =
            serde_json::from_str(r#"{ "event": "synchronization_done", "timestamp": 12.5 }"#)
                .unwrap();
        assert_eq!(done, SyncEvent::SynchronizationDone { timestamp: 12.5 });
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        FrameOutput, ImageSeries, SessionBlueprint, SyncEvent, TimelineKind, TransformMatrix,
    };
    use observability::SyncMetricsAggregator;
    use parking_lot::Mutex;
    use sync_engine::{SyncOutcome, Synchronizer};
    use timeline::{
        FrameTimelineBuffer, MatrixTimelineBuffer, MockProducer, MockProducerConfig, SessionClock,
    };
    use tokio::sync::mpsc;

    struct Rig {
        frames: Vec<Arc<FrameTimelineBuffer>>,
        matrices: Vec<Arc<MatrixTimelineBuffer>>,
        frame_outputs: Vec<Arc<Mutex<ImageSeries>>>,
        matrix_outputs: Vec<Arc<Mutex<TransformMatrix>>>,
        sync: Synchronizer,
        events: mpsc::UnboundedReceiver<SyncEvent>,
    }

    /// Build timelines, outputs and a synchronizer from a TOML session
    fn rig(toml: &str) -> Rig {
        let blueprint: SessionBlueprint = ConfigLoader::load_from_str(toml, ConfigFormat::Toml)
            .expect("valid session config");
        let sync_config = &blueprint.synchronizer;

        let frames: Vec<_> = blueprint
            .frame_sources
            .iter()
            .enumerate()
            .map(|(i, s)| {
                FrameTimelineBuffer::shared(
                    &format!("frame{i}"),
                    s.source.capacity,
                    s.geometry(),
                    s.source.elements,
                )
                .unwrap()
            })
            .collect();
        let matrices: Vec<_> = blueprint
            .matrix_sources
            .iter()
            .enumerate()
            .map(|(i, s)| {
                MatrixTimelineBuffer::shared(&format!("matrix{i}"), s.source.capacity, s.source.elements)
                    .unwrap()
            })
            .collect();
        let frame_outputs: Vec<_> = sync_config
            .frame_outputs
            .iter()
            .map(|_| ImageSeries::shared())
            .collect();
        let matrix_outputs: Vec<_> = sync_config
            .matrix_outputs
            .iter()
            .map(|_| TransformMatrix::shared())
            .collect();

        let mut builder = Synchronizer::builder(sync_config.clone());
        for t in &frames {
            builder = builder.frame_timeline(t);
        }
        for t in &matrices {
            builder = builder.matrix_timeline(t);
        }
        for o in &frame_outputs {
            builder = builder.frame_output(o.clone());
        }
        for o in &matrix_outputs {
            builder = builder.matrix_output(o.clone());
        }
        let sync = builder.build().unwrap();
        let events = sync.subscribe();

        Rig {
            frames,
            matrices,
            frame_outputs,
            matrix_outputs,
            sync,
            events,
        }
    }

    fn drain(events: &mut mpsc::UnboundedReceiver<SyncEvent>) -> Vec<SyncEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    fn done_instants(events: &[SyncEvent]) -> Vec<f64> {
        events
            .iter()
            .filter_map(|e| match e {
                SyncEvent::SynchronizationDone { timestamp } => Some(*timestamp),
                _ => None,
            })
            .collect()
    }

    /// Completed rounds in which both slot 0 outputs were synchronized
    fn rounds_with_both_slots(events: &[SyncEvent]) -> usize {
        let (mut frame, mut matrix) = (false, false);
        let mut rounds = 0;
        for event in events {
            match event {
                SyncEvent::FrameSlotSynchronized { slot: 0 } => frame = true,
                SyncEvent::FrameSlotUnsynchronized { slot: 0 } => frame = false,
                SyncEvent::MatrixSlotSynchronized { slot: 0 } => matrix = true,
                SyncEvent::MatrixSlotUnsynchronized { slot: 0 } => matrix = false,
                SyncEvent::SynchronizationDone { .. } if frame && matrix => rounds += 1,
                _ => {}
            }
        }
        rounds
    }

    fn translation(x: f32) -> [f32; 16] {
        [
            1.0, 0.0, 0.0, x, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ]
    }

    const TWO_TIMELINES: &str = r#"
[synchronizer]
tolerance = 100.0

[[synchronizer.frame_timelines]]
name = "video"

[[synchronizer.matrix_timelines]]
name = "probe"

[[synchronizer.frame_outputs]]
timeline_index = 0
notify_on_change = true

[[synchronizer.matrix_outputs]]
timeline_index = 0
notify_on_change = true

[[frame_sources]]
frequency_hz = 200.0
width = 4
height = 4

[[matrix_sources]]
frequency_hz = 200.0
"#;

    /// End-to-end test: MockProducer -> timelines -> Synchronizer -> outputs
    ///
    /// 验证完整的数据流：
    /// 1. MockProducer 按频率推送样本
    /// 2. 按请求触发同步，同步时刻严格递增
    /// 3. 输出被写入，槽位同步事件先于完成事件
    #[tokio::test]
    async fn test_e2e_on_request_session() {
        let mut rig = rig(TWO_TIMELINES);
        rig.sync.start().unwrap();

        let clock = SessionClock::new();
        let producers = vec![
            MockProducer::frames(rig.frames[0].clone(), fast()),
            MockProducer::matrices(rig.matrices[0].clone(), fast()),
        ];
        let handles: Vec<_> = producers.iter().map(|p| p.start(clock)).collect();

        let mut aggregator = SyncMetricsAggregator::new();
        let mut seen = Vec::new();
        let collected = tokio::time::timeout(Duration::from_secs(5), async {
            // The first rounds may run before the second producer pushed anything
            while rounds_with_both_slots(&seen) < 5 {
                rig.sync.request_synchronization();
                tokio::time::sleep(Duration::from_millis(10)).await;
                for event in drain(&mut rig.events) {
                    aggregator.update(&event);
                    seen.push(event);
                }
            }
        })
        .await;
        assert!(collected.is_ok(), "timed out waiting for rounds");

        for producer in &producers {
            producer.stop();
        }
        for handle in handles {
            assert!(handle.await.unwrap() >= 1);
        }
        rig.sync.stop().await;

        let instants = done_instants(&seen);
        assert!(instants.windows(2).all(|w| w[0] < w[1]), "{instants:?}");

        // Each slot event is followed by the completion of its round
        for slot_event in [
            SyncEvent::FrameSlotSynchronized { slot: 0 },
            SyncEvent::MatrixSlotSynchronized { slot: 0 },
        ] {
            let at = seen.iter().position(|e| *e == slot_event).unwrap();
            let round_end = seen[at..].iter().find(|e| {
                matches!(
                    e,
                    SyncEvent::SynchronizationDone { .. } | SyncEvent::SynchronizationSkipped
                )
            });
            assert!(matches!(round_end, Some(SyncEvent::SynchronizationDone { .. })));
        }

        let both = rounds_with_both_slots(&seen) as u64;
        assert!(both >= 5);
        assert!(rig.frame_outputs[0].lock().image().modified_count() >= both);
        assert!(rig.matrix_outputs[0].lock().modified_count() >= both);
        assert!(rig.frame_outputs[0].lock().acquisition_time().is_some());

        let summary = aggregator.summary();
        assert_eq!(summary.rounds_done, instants.len() as u64);
        assert_eq!(summary.slot_synchronized.get("frame0"), Some(&1));
    }

    fn fast() -> MockProducerConfig {
        MockProducerConfig {
            frequency_hz: 200.0,
            ..Default::default()
        }
    }

    /// 滞后超过容差的时间线永远不会被同步
    #[tokio::test]
    async fn test_e2e_timer_mode_with_lagging_timeline() {
        let config = format!("{TWO_TIMELINES}\n").replace(
            "[synchronizer]\n",
            "[synchronizer]\nlegacy_auto_sync = true\ntimer_period = 5\n",
        );
        let mut rig = rig(&config);
        rig.sync.start().unwrap();

        let clock = SessionClock::new();
        let producers = [
            MockProducer::frames(rig.frames[0].clone(), fast()),
            MockProducer::matrices(
                rig.matrices[0].clone(),
                MockProducerConfig {
                    lag_ms: 1000.0,
                    ..fast()
                },
            ),
        ];
        // Frames first, so the lagging matrix never is the newest timeline
        let mut handles = vec![producers[0].start(clock)];
        tokio::time::sleep(Duration::from_millis(20)).await;
        handles.push(producers[1].start(clock));

        let mut seen = Vec::new();
        let collected = tokio::time::timeout(Duration::from_secs(5), async {
            while done_instants(&seen).len() < 3 {
                match rig.events.recv().await {
                    Some(event) => seen.push(event),
                    None => break,
                }
            }
        })
        .await;
        assert!(collected.is_ok(), "timed out waiting for timer rounds");

        for producer in &producers {
            producer.stop();
        }
        for handle in handles {
            handle.await.unwrap();
        }
        rig.sync.stop().await;

        assert!(seen.contains(&SyncEvent::FrameSlotSynchronized { slot: 0 }));
        assert!(!seen.contains(&SyncEvent::MatrixSlotSynchronized { slot: 0 }));
        assert_eq!(rig.matrix_outputs[0].lock().modified_count(), 0);
        assert!(rig.sync.request_synchronization() == SyncOutcome::Ignored);
    }

    /// 延迟、重绑定与清空重置
    #[test]
    fn test_e2e_delay_rebinding_and_clear() {
        let config = r#"
[synchronizer]
tolerance = 500.0

[[synchronizer.frame_timelines]]
name = "video"
delay = 50

[[synchronizer.matrix_timelines]]
name = "probe"

[[synchronizer.frame_outputs]]
timeline_index = 0

[[synchronizer.matrix_outputs]]
timeline_index = 0

[[frame_sources]]
width = 2
height = 1

[[matrix_sources]]
elements = 2
"#;
        let mut rig = rig(config);
        rig.sync.start().unwrap();

        let video = &rig.frames[0];
        for (timestamp, value) in [(900.0, 1u8), (950.0, 2), (1000.0, 3)] {
            let mut buffer = video.create_buffer(timestamp);
            video
                .set_element(&mut buffer, 0, Bytes::from(vec![value; 2]))
                .unwrap();
            video.push(buffer);
        }
        let probe = &rig.matrices[0];
        let mut buffer = probe.create_buffer(1000.0);
        probe.set_element(&mut buffer, 0, translation(1.0)).unwrap();
        probe.set_element(&mut buffer, 1, translation(2.0)).unwrap();
        probe.push(buffer);

        // Delay 50 ms: frame queried at 950
        assert_eq!(rig.sync.request_synchronization(), SyncOutcome::Done(1000.0));
        assert_eq!(rig.frame_outputs[0].lock().image().pixels(), &[2, 2]);
        assert_eq!(rig.frame_outputs[0].lock().acquisition_time(), Some(1000.0));
        assert_eq!(rig.matrix_outputs[0].lock().coefficient(0, 3), 1.0);

        // Retarget the matrix slot to element 1, drop the delay
        rig.sync
            .set_binding(TimelineKind::Matrix, 0, 1, 0)
            .unwrap();
        rig.sync.set_delay_by_key("frameDelay_0", 0).unwrap();

        probe.clear();
        assert_eq!(rig.sync.last_synchronization_timestamp(), None);

        let mut buffer = probe.create_buffer(990.0);
        probe.set_element(&mut buffer, 1, translation(7.0)).unwrap();
        probe.push(buffer);

        // Older instant accepted after the clear
        assert_eq!(rig.sync.request_synchronization(), SyncOutcome::Done(990.0));
        assert_eq!(rig.matrix_outputs[0].lock().coefficient(0, 3), 7.0);
        assert_eq!(rig.frame_outputs[0].lock().image().pixels(), &[3, 3]);
        assert!(rig.frame_outputs[0].lock().layout().is_some());

        let events = drain(&mut rig.events);
        assert_eq!(done_instants(&events), vec![1000.0, 990.0]);
    }
}

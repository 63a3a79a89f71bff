pub mod fixtures;

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use stx_event_bus::*;

    #[tokio::test]
    async fn test_event_flow() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe::<TestEvent>().unwrap();

        let event = TestEvent(42);
        bus.publish(event.clone()).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(*received, event);
    }

    #[tokio::test]
    async fn test_receiver_lagged_recovery() {
        let bus = EventBus::new();
        let capacity = 2;
        let mut rx = bus.subscribe_with_capacity::<TestEvent>(capacity).unwrap();

        let total_messages = 100;
        for i in 0..total_messages {
            bus.publish(TestEvent(i)).unwrap();
        }

        let first_received = loop {
            match rx.recv().await {
                Ok(event) => break event,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {},
                Err(err) => panic!("Should recover from lag: {err:?}"),
            }
        };

        assert!(
            first_received.0 >= (total_messages - capacity),
            "Should have skipped to the fresh tail of the buffer. Expected >= {}, got {}",
            total_messages - capacity,
            first_received.0
        );

        let second_received = rx.recv().await.expect("Should continue receiving");
        assert_eq!(second_received.0, first_received.0 + 1);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_isolation() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe::<TestEvent>().unwrap();
        let mut rx2 = bus.subscribe::<TestEvent>().unwrap();

        bus.publish(TestEvent(100)).unwrap();

        let res1 = rx1.recv().await.unwrap();
        let res2 = rx2.recv().await.unwrap();

        assert_eq!(res1.0, res2.0);
    }

    #[tokio::test]
    async fn test_multiple_event_types_are_isolated() {
        #[derive(Clone, Debug, PartialEq, Eq)]
        struct OtherEvent(pub usize);

        let bus = EventBus::new();
        let mut rx_test = bus.subscribe::<TestEvent>().unwrap();
        let mut rx_other = bus.subscribe::<OtherEvent>().unwrap();

        bus.publish(TestEvent(7)).unwrap();
        bus.publish(OtherEvent(13)).unwrap();

        let got_test = rx_test.recv().await.unwrap();
        let got_other = rx_other.recv().await.unwrap();

        assert_eq!(got_test.0, 7);
        assert_eq!(got_other.0, 13);
    }

    #[tokio::test]
    async fn test_mpsc_queue_semantics() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_mpsc::<TestEvent>(8).unwrap();

        bus.publish_mpsc(TestEvent(1)).unwrap();
        bus.publish_mpsc(TestEvent(2)).unwrap();

        assert_eq!(rx.recv().await.unwrap().0, 1);
        assert_eq!(rx.recv().await.unwrap().0, 2);
    }

    #[tokio::test]
    async fn test_mpsc_receiver_can_only_be_taken_once() {
        let bus = EventBus::new();
        let _rx = bus.subscribe_mpsc::<TestEvent>(8).unwrap();

        let second = bus.subscribe_mpsc::<TestEvent>(8);
        assert!(matches!(second, Err(EventBusError::ChannelKindMismatch { .. })));
    }

    #[tokio::test]
    async fn test_channel_kind_conflict_is_rejected() {
        let bus = EventBus::new();
        let _rx = bus.subscribe::<TestEvent>().unwrap();

        let err = bus.publish_mpsc(TestEvent(1)).unwrap_err();
        assert!(matches!(err, EventBusError::ChannelKindMismatch { .. }));
    }

    #[tokio::test]
    async fn test_watch_returns_latest_value() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_watch::<TestEvent>(TestEvent(0)).unwrap();

        bus.publish_watch(TestEvent(1)).unwrap();
        bus.publish_watch(TestEvent(2)).unwrap();

        let latest = rx.recv_event().await.unwrap();
        assert_eq!(latest.0, 2);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let bus = EventBus::new();
        let delivered = bus.publish(TestEvent(5)).unwrap();
        assert_eq!(delivered, 0);
    }

    #[test]
    fn test_shutdown_clears_channels() {
        let bus = EventBus::new();
        let _rx = bus.subscribe::<TestEvent>().unwrap();
        assert_eq!(bus.shutdown(), 1);
        assert_eq!(bus.shutdown(), 0);
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let bus = EventBus::new();
        let err = bus.subscribe_with_capacity::<TestEvent>(0).unwrap_err();
        assert!(matches!(err, EventBusError::InvalidCapacity { .. }));
    }
}

#[cfg(feature = "blocking")]
#[cfg(test)]
mod multi_thread_tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    use ring_queue::{
        BlockingRingQueue, ClosedRing, RingQueueError, RingQueueOptions, WhenEmpty, WhenFull,
    };

    use test_support::utils::{assert_elapsed_between, init_tracing, spawn_after, timed, wait_until};

    #[test]
    /**
     * One producer, one blocking consumer: every element arrives once and in order.
     */
    fn spsc_blocking_in_order() {
        init_tracing();
        let capacity = 16;
        let total: u32 = 10_000;
        let queue =
            Arc::new(BlockingRingQueue::new(capacity, WhenFull::Error, WhenEmpty::Block).unwrap());

        thread::scope(|s| {
            // consumer thread
            let consumer_queue = Arc::clone(&queue);
            s.spawn(move || {
                for expected in 0..total {
                    let (value, _) = consumer_queue.pop().unwrap();
                    assert_eq!(value, expected, "consumed data does not match expected");
                }
            });

            // producer thread
            let producer_queue = Arc::clone(&queue);
            s.spawn(move || {
                let mut counter = 0;
                while counter < total {
                    match producer_queue.push(counter) {
                        Ok(_) => counter += 1,
                        Err(RingQueueError::FullQueue) => {
                            // queue is full, just spin
                            thread::yield_now();
                        }
                        Err(e) => panic!("unexpected error when producing: {e:?}"),
                    }
                }
            });
        });

        assert!(queue.is_empty());
    }

    #[test]
    /**
     * Multiple producers and multiple blocking consumers. Consumers stop when the queue is
     * closed; every produced element must be consumed exactly once before that.
     */
    fn mpmc_blocking_exactly_once() {
        let num_producers = 4;
        let num_consumers = 4;
        let per_producer: usize = 2_000;
        let total = num_producers * per_producer;

        let queue = Arc::new(BlockingRingQueue::new(32, WhenFull::Error, WhenEmpty::Block).unwrap());
        let consumed = Arc::new(Mutex::new(Vec::with_capacity(total)));
        let consumed_count = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(num_producers + num_consumers));

        let consumers: Vec<_> = (0..num_consumers)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let consumed = Arc::clone(&consumed);
                let consumed_count = Arc::clone(&consumed_count);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let mut local = Vec::new();
                    loop {
                        match queue.pop() {
                            Ok((value, _)) => {
                                local.push(value);
                                consumed_count.fetch_add(1, Ordering::SeqCst);
                            }
                            Err(RingQueueError::Closed) => break,
                            Err(e) => panic!("unexpected error when consuming: {e:?}"),
                        }
                    }
                    consumed.lock().unwrap().extend(local);
                })
            })
            .collect();

        let producers: Vec<_> = (0..num_producers)
            .map(|producer| {
                let queue = Arc::clone(&queue);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let mut sent = 0;
                    while sent < per_producer {
                        match queue.push(producer * per_producer + sent) {
                            Ok(_) => sent += 1,
                            Err(RingQueueError::FullQueue) => thread::yield_now(),
                            Err(e) => panic!("unexpected error when producing: {e:?}"),
                        }
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }
        assert!(
            wait_until(Duration::from_secs(10), || consumed_count.load(Ordering::SeqCst)
                == total),
            "consumers stalled at {} of {total}",
            consumed_count.load(Ordering::SeqCst)
        );

        queue.close().unwrap();
        for consumer in consumers {
            consumer.join().unwrap();
        }

        let consumed = consumed.lock().unwrap();
        assert_eq!(consumed.len(), total);
        let unique: HashSet<_> = consumed.iter().copied().collect();
        assert_eq!(unique.len(), total);
        assert_eq!(unique, (0..total).collect::<HashSet<_>>());
    }

    #[test]
    /**
     * A pop on an empty blocking queue returns the element pushed later by another thread.
     */
    fn blocked_pop_returns_later_push() {
        let queue =
            Arc::new(BlockingRingQueue::new(4, WhenFull::Error, WhenEmpty::Block).unwrap());
        let delay = Duration::from_millis(50);

        let start = Instant::now();
        let producer = {
            let queue = Arc::clone(&queue);
            spawn_after(delay, move || queue.push(String::from("late")))
        };

        assert_eq!(queue.pop().unwrap(), (String::from("late"), 0));
        assert!(start.elapsed() >= delay);
        producer.join().unwrap().unwrap();
    }

    #[test]
    /**
     * A deadline one unit away fails the pop after roughly that long, never before.
     */
    fn deadline_fires_after_duration() {
        let queue = BlockingRingQueue::<u64>::new(10, WhenFull::Error, WhenEmpty::Block).unwrap();
        let unit = Duration::from_millis(200);

        // fill and drain first so the indices are not at their initial position
        for i in 0..10 {
            queue.push(i).unwrap();
        }
        for _ in 0..10 {
            queue.pop().unwrap();
        }

        queue.set_pop_deadline(Some(Instant::now() + unit)).unwrap();
        let (result, elapsed) = timed(|| queue.pop());
        assert_eq!(result.unwrap_err(), RingQueueError::DeadlineExceeded);
        assert_elapsed_between(elapsed, unit - Duration::from_millis(1), unit * 10);
    }

    #[test]
    /**
     * Every waiter blocked at the time the deadline fires gives up.
     */
    fn deadline_releases_all_waiters() {
        let queue =
            Arc::new(BlockingRingQueue::<u8>::new(4, WhenFull::Error, WhenEmpty::Block).unwrap());
        let deadline = Instant::now() + Duration::from_millis(100);
        queue.set_pop_deadline(Some(deadline)).unwrap();

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.pop())
            })
            .collect();

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), Err(RingQueueError::DeadlineExceeded));
        }
        assert!(Instant::now() >= deadline);
    }

    #[test]
    /**
     * Moving the deadline later while a pop waits extends the wait.
     */
    fn replacing_deadline_extends_wait() {
        let queue =
            Arc::new(BlockingRingQueue::<u8>::new(4, WhenFull::Error, WhenEmpty::Block).unwrap());
        let start = Instant::now();
        queue
            .set_pop_deadline(Some(start + Duration::from_millis(50)))
            .unwrap();

        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || timed(|| queue.pop()))
        };

        thread::sleep(Duration::from_millis(10));
        let extended = start + Duration::from_millis(250);
        queue.set_pop_deadline(Some(extended)).unwrap();

        let (result, _) = waiter.join().unwrap();
        assert_eq!(result, Err(RingQueueError::DeadlineExceeded));
        assert!(Instant::now() >= extended);
    }

    #[test]
    /**
     * Closing wakes every suspended pop immediately with Closed and drains through the
     * finalizer.
     */
    fn close_wakes_all_waiters() {
        let finalized = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&finalized);
        let options = RingQueueOptions::new(4)
            .when_empty(WhenEmpty::Block)
            .on_close(move |ring: ClosedRing<u8>| {
                assert!(ring.is_empty());
                counter.fetch_add(1, Ordering::SeqCst);
            });
        let queue = Arc::new(BlockingRingQueue::with_options(options).unwrap());

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || timed(|| queue.pop()))
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        let closed_at = Instant::now();
        queue.close().unwrap();

        for waiter in waiters {
            let (result, _) = waiter.join().unwrap();
            assert_eq!(result, Err(RingQueueError::Closed));
        }
        assert!(closed_at.elapsed() < Duration::from_secs(5));

        queue.close().unwrap();
        assert_eq!(finalized.load(Ordering::SeqCst), 1);
        assert_eq!(queue.push(1).unwrap_err(), RingQueueError::Closed);
    }

    #[test]
    /**
     * Concurrent pushes under the overwrite policy never report more than capacity and leave
     * the newest elements of each producer in order.
     */
    fn overwrite_under_contention() {
        let capacity = 8;
        let per_producer: u32 = 5_000;
        let queue =
            Arc::new(BlockingRingQueue::new(capacity, WhenFull::Overwrite, WhenEmpty::Error).unwrap());

        thread::scope(|s| {
            for producer in 0..4u32 {
                let queue = Arc::clone(&queue);
                s.spawn(move || {
                    for i in 0..per_producer {
                        let len = queue.push((producer, i)).unwrap();
                        assert!(len <= capacity);
                    }
                });
            }
        });

        assert_eq!(queue.len(), capacity);
        let mut last_seen = [None::<u32>; 4];
        while let Ok(((producer, i), _)) = queue.pop() {
            let slot = &mut last_seen[producer as usize];
            if let Some(previous) = *slot {
                assert!(i > previous, "producer {producer} out of order");
            }
            *slot = Some(i);
        }
    }
}

//! Wave composition and the spawn driver.
//!
//! Composition is a pure function of the wave number. The driver side is a
//! `Spawner` cursor living in the room plus a `SpawnTimer` task that does
//! nothing but post `SpawnTick`/`SpawnRetry` events back to the event loop.
//! Every arm of the spawner bumps its generation, so ticks from a timer that
//! belonged to an earlier run are recognised and dropped.

use crate::network::ServerEvent;
use shared::{EnemyKind, RoomCode};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

const BASE_ENEMIES: u32 = 5;
const SLOWEST_CADENCE_MS: u64 = 1500;
const FASTEST_CADENCE_MS: u64 = 500;
const CADENCE_STEP_MS: u64 = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct WaveConfig {
    pub enemies: Vec<EnemyKind>,
    pub spawn_interval: Duration,
}

/// Enemy line-up and spawn cadence for `wave`.
pub fn wave_config(wave: u32) -> WaveConfig {
    let count = BASE_ENEMIES + wave / 2;
    let enemies = (0..count)
        .map(|slot| {
            if wave % 5 == 0 && slot == count - 1 {
                EnemyKind::Boss
            } else if wave % 3 == 0 && slot % 3 == 0 {
                EnemyKind::Tank
            } else if wave % 2 == 0 && slot % 2 == 0 {
                EnemyKind::Fast
            } else if wave >= 10 && slot % 4 == 0 {
                EnemyKind::Tank
            } else if wave >= 15 && slot % 5 == 0 {
                EnemyKind::Fast
            } else {
                EnemyKind::Basic
            }
        })
        .collect();

    let cadence = SLOWEST_CADENCE_MS
        .saturating_sub(CADENCE_STEP_MS * u64::from(wave))
        .max(FASTEST_CADENCE_MS);

    WaveConfig {
        enemies,
        spawn_interval: Duration::from_millis(cadence),
    }
}

/// Cursor over the current wave's line-up.
#[derive(Debug, Default)]
pub struct Spawner {
    generation: u64,
    wave: Option<WaveConfig>,
    emitted: usize,
}

impl Spawner {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Forgets the current run. Returns the new generation.
    pub fn invalidate(&mut self) -> u64 {
        self.generation += 1;
        self.wave = None;
        self.emitted = 0;
        self.generation
    }

    /// Starts emitting `round` from its first slot.
    pub fn arm(&mut self, round: u32) -> (u64, Duration) {
        let generation = self.invalidate();
        let config = wave_config(round);
        let cadence = config.spawn_interval;
        self.wave = Some(config);
        (generation, cadence)
    }

    /// Next slot index and enemy kind, if any remain.
    pub fn next_enemy(&mut self) -> Option<(usize, EnemyKind)> {
        let kind = *self.wave.as_ref()?.enemies.get(self.emitted)?;
        let slot = self.emitted;
        self.emitted += 1;
        Some((slot, kind))
    }

    pub fn is_exhausted(&self) -> bool {
        match &self.wave {
            Some(wave) => self.emitted >= wave.enemies.len(),
            None => true,
        }
    }
}

/// Background task posting spawn events for one room. Aborted on drop.
#[derive(Debug)]
pub struct SpawnTimer(JoinHandle<()>);

impl SpawnTimer {
    /// Posts `SpawnTick` every `period`, first one after a full period.
    pub fn every(
        events: mpsc::UnboundedSender<ServerEvent>,
        room_code: RoomCode,
        generation: u64,
        period: Duration,
    ) -> Self {
        SpawnTimer(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let tick = ServerEvent::SpawnTick {
                    room_code: room_code.clone(),
                    generation,
                };
                if events.send(tick).is_err() {
                    break;
                }
            }
        }))
    }

    /// Posts a single `SpawnRetry` after `delay`.
    pub fn after(
        events: mpsc::UnboundedSender<ServerEvent>,
        room_code: RoomCode,
        generation: u64,
        delay: Duration,
    ) -> Self {
        SpawnTimer(tokio::spawn(async move {
            sleep(delay).await;
            let _ = events.send(ServerEvent::SpawnRetry {
                room_code,
                generation,
            });
        }))
    }
}

impl Drop for SpawnTimer {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enemy_count_grows_every_two_waves() {
        for wave in 0..40 {
            assert_eq!(wave_config(wave).enemies.len() as u32, 5 + wave / 2);
        }
    }

    #[test]
    fn test_boss_only_on_last_slot_of_every_fifth_wave() {
        for wave in 1..40 {
            let enemies = wave_config(wave).enemies;
            let bosses: Vec<usize> = enemies
                .iter()
                .enumerate()
                .filter(|(_, kind)| **kind == EnemyKind::Boss)
                .map(|(slot, _)| slot)
                .collect();

            if wave % 5 == 0 {
                assert_eq!(bosses, vec![enemies.len() - 1], "wave {}", wave);
            } else {
                assert!(bosses.is_empty(), "wave {}", wave);
            }
        }
    }

    #[test]
    fn test_first_wave_is_all_basic() {
        assert!(wave_config(1)
            .enemies
            .iter()
            .all(|kind| *kind == EnemyKind::Basic));
    }

    #[test]
    fn test_type_precedence() {
        // 6: divisible by 3 and 2, tank wins on slot 0 and 6, fast on the other even slots
        let six = wave_config(6).enemies;
        assert_eq!(six.len(), 8);
        assert_eq!(six[0], EnemyKind::Tank);
        assert_eq!(six[2], EnemyKind::Fast);
        assert_eq!(six[3], EnemyKind::Tank);
        assert_eq!(six[5], EnemyKind::Basic);
        assert_eq!(six[6], EnemyKind::Tank);

        // 11: only the wave >= 10 rule applies
        let eleven = wave_config(11).enemies;
        assert_eq!(eleven[0], EnemyKind::Tank);
        assert_eq!(eleven[4], EnemyKind::Tank);
        assert_eq!(eleven[1], EnemyKind::Basic);

        // 17: slot 5 is not a multiple of 4 but is of 5
        let seventeen = wave_config(17).enemies;
        assert_eq!(seventeen[5], EnemyKind::Fast);
        assert_eq!(seventeen[8], EnemyKind::Tank);
    }

    #[test]
    fn test_spawn_cadence() {
        assert_eq!(wave_config(0).spawn_interval, Duration::from_millis(1500));
        assert_eq!(wave_config(1).spawn_interval, Duration::from_millis(1450));
        assert_eq!(wave_config(10).spawn_interval, Duration::from_millis(1000));
        assert_eq!(wave_config(20).spawn_interval, Duration::from_millis(500));
        assert_eq!(wave_config(50).spawn_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_spawner_emits_every_slot_once() {
        let mut spawner = Spawner::default();
        assert!(spawner.is_exhausted());

        let (generation, cadence) = spawner.arm(2);
        assert!(spawner.is_current(generation));
        assert_eq!(cadence, Duration::from_millis(1400));

        let mut slots = Vec::new();
        while let Some((slot, _)) = spawner.next_enemy() {
            slots.push(slot);
        }
        assert_eq!(slots, vec![0, 1, 2, 3, 4, 5]);
        assert!(spawner.is_exhausted());
    }

    #[test]
    fn test_rearm_invalidates_previous_generation() {
        let mut spawner = Spawner::default();
        let (first, _) = spawner.arm(1);
        spawner.next_enemy();

        let (second, _) = spawner.arm(1);
        assert_ne!(first, second);
        assert!(!spawner.is_current(first));
        assert_eq!(spawner.next_enemy().map(|(slot, _)| slot), Some(0));

        spawner.invalidate();
        assert!(spawner.next_enemy().is_none());
    }

    #[tokio::test]
    async fn test_retry_timer_posts_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _timer = SpawnTimer::after(tx, "ROOM01".to_string(), 4, Duration::from_millis(5));

        match rx.recv().await {
            Some(ServerEvent::SpawnRetry {
                room_code,
                generation,
            }) => {
                assert_eq!(room_code, "ROOM01");
                assert_eq!(generation, 4);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tick_timer_repeats_until_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timer = SpawnTimer::every(tx, "ROOM01".to_string(), 1, Duration::from_millis(5));

        for _ in 0..3 {
            assert!(matches!(
                rx.recv().await,
                Some(ServerEvent::SpawnTick { generation: 1, .. })
            ));
        }

        drop(timer);
        // The aborted task drops its sender, which closes the channel once drained.
        while rx.recv().await.is_some() {}
    }

    #[tokio::test]
    async fn test_tick_timer_waits_a_full_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _timer = SpawnTimer::every(tx, "ROOM01".to_string(), 1, Duration::from_secs(3600));
        tokio::task::yield_now().await;

        let mut next = tokio_test::task::spawn(rx.recv());
        tokio_test::assert_pending!(next.poll());
    }
}

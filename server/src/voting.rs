//! Post-wave upgrade vote.

use rand::seq::SliceRandom;
use rand::Rng;
use shared::PlayerId;
use std::collections::HashMap;

pub const UPGRADE_CATALOG: [&str; 10] = [
    "damage_boost",
    "range_boost",
    "fire_rate_boost",
    "gold_bonus",
    "extra_lives",
    "tower_discount",
    "critical_chance",
    "splash_damage",
    "piercing_shots",
    "life_steal",
];

pub const OPTIONS_PER_VOTE: usize = 3;

/// Draws distinct upgrade ids from the catalog.
pub fn pick_upgrades<R: Rng + ?Sized>(rng: &mut R) -> Vec<String> {
    UPGRADE_CATALOG
        .choose_multiple(rng, OPTIONS_PER_VOTE)
        .map(|id| id.to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Voting {
    pub options: Vec<String>,
    votes: HashMap<PlayerId, String>,
}

impl Voting {
    pub fn new(options: Vec<String>) -> Self {
        Self {
            options,
            votes: HashMap::new(),
        }
    }

    /// Records a ballot, replacing any earlier one from the same player.
    pub fn cast(&mut self, player_id: &str, upgrade_id: &str) {
        self.votes
            .insert(player_id.to_owned(), upgrade_id.to_owned());
    }

    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }

    /// Picks the winner once every member of `electorate` has voted.
    ///
    /// Only ballots from the electorate count, so a ballot left behind by a
    /// player who has since left the room is ignored. The most voted option
    /// wins; ties are broken uniformly among the options sharing the top
    /// count.
    pub fn resolve<R: Rng + ?Sized>(&self, electorate: &[PlayerId], rng: &mut R) -> Option<String> {
        if electorate.is_empty() {
            return None;
        }

        let mut tally: Vec<(&str, usize)> = Vec::new();
        for member in electorate {
            let upgrade = self.votes.get(member)?;
            match tally.iter_mut().find(|(id, _)| *id == upgrade.as_str()) {
                Some((_, count)) => *count += 1,
                None => tally.push((upgrade.as_str(), 1)),
            }
        }

        let top = tally.iter().map(|(_, count)| *count).max()?;
        let leaders: Vec<&str> = tally
            .iter()
            .filter(|(_, count)| *count == top)
            .map(|(id, _)| *id)
            .collect();

        leaders.choose(rng).map(|id| id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_pick_upgrades_distinct_from_catalog() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let picked = pick_upgrades(&mut rng);
            assert_eq!(picked.len(), 3);

            let unique: HashSet<&String> = picked.iter().collect();
            assert_eq!(unique.len(), 3);
            assert!(picked
                .iter()
                .all(|id| UPGRADE_CATALOG.contains(&id.as_str())));
        }
    }

    fn electorate(size: usize) -> Vec<PlayerId> {
        (1..=size).map(|n| format!("p{}", n)).collect()
    }

    #[test]
    fn test_resolution_waits_for_every_member() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut voting = Voting::new(pick_upgrades(&mut rng));

        voting.cast("p1", "gold_bonus");
        assert_eq!(voting.resolve(&electorate(2), &mut rng), None);

        voting.cast("p1", "life_steal");
        assert_eq!(voting.vote_count(), 1);
        assert_eq!(voting.resolve(&electorate(2), &mut rng), None);
    }

    #[test]
    fn test_agreeing_votes_always_win() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let mut voting = Voting::new(vec![]);
            voting.cast("p1", "splash_damage");
            voting.cast("p2", "splash_damage");
            assert_eq!(
                voting.resolve(&electorate(2), &mut rng),
                Some("splash_damage".to_string())
            );
        }
    }

    #[test]
    fn test_split_vote_picks_one_of_the_two() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut seen = HashSet::new();

        for _ in 0..200 {
            let mut voting = Voting::new(vec![]);
            voting.cast("p1", "damage_boost");
            voting.cast("p2", "range_boost");
            let winner = voting.resolve(&electorate(2), &mut rng).unwrap();
            assert!(winner == "damage_boost" || winner == "range_boost");
            seen.insert(winner);
        }

        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_three_players_majority_wins() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let mut voting = Voting::new(vec![]);
            voting.cast("p1", "extra_lives");
            voting.cast("p2", "gold_bonus");
            voting.cast("p3", "gold_bonus");
            assert_eq!(voting.resolve(&electorate(3), &mut rng), Some("gold_bonus".to_string()));
        }
    }

    #[test]
    fn test_empty_ballot_never_resolves() {
        let mut rng = StdRng::seed_from_u64(6);
        assert_eq!(Voting::new(vec![]).resolve(&[], &mut rng), None);
    }

    #[test]
    fn test_ballots_from_outside_the_electorate_are_ignored() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut voting = Voting::new(vec![]);
        voting.cast("gone", "life_steal");
        voting.cast("p1", "gold_bonus");

        assert_eq!(voting.resolve(&electorate(2), &mut rng), None);

        voting.cast("p2", "gold_bonus");
        assert_eq!(
            voting.resolve(&electorate(2), &mut rng),
            Some("gold_bonus".to_string())
        );
    }
}

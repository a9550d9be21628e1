use crate::competitor::{Competitor, Identity, MatchRecord, Mode};
use crate::elo::elo;
use crate::error::{LedgerError, Result};
use crate::storage::{leaderboard, State, Storage};
use chrono::Local;
use tracing::info;

/// Competitor table and match log, saved in full after every change.
pub struct Ledger<S> {
    storage: S,
    state: State,
}

impl<S: Storage> Ledger<S> {
    pub fn open(mut storage: S, mode: Mode) -> Result<Self> {
        let state = storage.load(mode)?;
        if state.mode != mode {
            return Err(LedgerError::ModeMismatch {
                expected: mode,
                found: state.mode,
            });
        }
        Ok(Self { storage, state })
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Competitors in table order.
    pub fn competitors(&self) -> &[Competitor] {
        &self.state.competitors
    }

    pub fn matches(&self) -> &[MatchRecord] {
        &self.state.matches
    }

    pub fn get(&self, identity: &Identity) -> Option<&Competitor> {
        self.state
            .competitors
            .iter()
            .find(|c| &c.identity == identity)
    }

    fn position(&self, identity: &Identity) -> Result<usize> {
        self.state
            .competitors
            .iter()
            .position(|c| &c.identity == identity)
            .ok_or_else(|| LedgerError::UnknownCompetitor(identity.clone()))
    }

    fn check_mode(&self, identity: &Identity) -> Result<()> {
        if identity.mode() != self.mode() {
            return Err(LedgerError::ModeMismatch {
                expected: self.mode(),
                found: identity.mode(),
            });
        }
        Ok(())
    }

    /// Saves `next` and only then makes it the current state.
    fn commit(&mut self, next: State) -> Result<()> {
        self.storage.save(&next)?;
        self.state = next;
        Ok(())
    }

    pub fn register(&mut self, identity: Identity) -> Result<()> {
        self.check_mode(&identity)?;
        if self.get(&identity).is_some() {
            return Err(LedgerError::DuplicateRegistration(identity));
        }

        let mut next = self.state.clone();
        next.competitors.push(Competitor::new(identity.clone()));
        self.commit(next)?;
        info!(competitor = %identity, "registered");
        Ok(())
    }

    /// Applies one match result and returns both new ratings.
    pub fn record_match(
        &mut self,
        a: &Identity,
        b: &Identity,
        score_a: u32,
        score_b: u32,
    ) -> Result<(f64, f64)> {
        self.check_mode(a)?;
        self.check_mode(b)?;
        let ia = self.position(a)?;
        let ib = self.position(b)?;
        if ia == ib {
            return Err(LedgerError::SelfMatch(a.clone()));
        }

        let mut next = self.state.clone();
        let a_before = next.competitors[ia].rating;
        let b_before = next.competitors[ib].rating;
        let (a_after, b_after) = elo(a_before, b_before, score_a, score_b);

        let first = &mut next.competitors[ia];
        first.rating = a_after;
        first.history.push(b, score_a, score_b);
        first.matches += 1;

        let second = &mut next.competitors[ib];
        second.rating = b_after;
        second.history.push(a, score_b, score_a);
        second.matches += 1;

        next.matches.push(MatchRecord {
            a: a.clone(),
            b: b.clone(),
            score_a,
            score_b,
            a_before,
            a_after,
            b_before,
            b_after,
            recorded_at: Some(Local::now().naive_local()),
        });
        sort_table(&mut next);
        self.commit(next)?;

        info!(
            %a, %b, score_a, score_b, a_after, b_after,
            "recorded match"
        );
        Ok((a_after, b_after))
    }

    /// Competitors by descending rating; ties keep table order.
    pub fn leaderboard(&self) -> Vec<&Competitor> {
        leaderboard(&self.state.competitors)
    }

    /// Rewrites the stored table in leaderboard order.
    pub fn refresh(&mut self) -> Result<()> {
        let mut next = self.state.clone();
        sort_table(&mut next);
        self.commit(next)
    }
}

fn sort_table(state: &mut State) {
    state.competitors = leaderboard(&state.competitors)
        .into_iter()
        .cloned()
        .collect();
}

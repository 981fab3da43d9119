//! Append-only handle given to code that emits influences

use crate::agent::Agent;
use crate::core::types::{AgentId, LevelId, TimeInterval};
use crate::influence::{
    Influence, InfluenceCategory, InfluenceKind, InfluenceSource, RegularInfluence, SystemInfluence,
};
use crate::simulation::model::ModelTypes;

/// Write-only influence buffer for one callback
///
/// Every influence emitted through the sink is stamped with the caller's
/// source and production interval. Target validity is checked by the engine
/// when the buffer is merged into the round's influence map.
pub struct InfluenceSink<'a, T: ModelTypes> {
    source: InfluenceSource,
    produced: TimeInterval,
    buffer: &'a mut Vec<Influence<T>>,
}

impl<'a, T: ModelTypes> InfluenceSink<'a, T> {
    pub fn new(source: InfluenceSource, produced: TimeInterval, buffer: &'a mut Vec<Influence<T>>) -> Self {
        Self {
            source,
            produced,
            buffer,
        }
    }

    /// Level the emitting code runs at
    pub fn level(&self) -> &LevelId {
        self.source.level()
    }

    pub fn produced(&self) -> TimeInterval {
        self.produced
    }

    pub fn emit(&mut self, target: LevelId, kind: InfluenceKind<T>) {
        self.buffer.push(Influence::new(
            target,
            self.produced,
            self.source.clone(),
            kind,
        ));
    }

    /// Emit a regular influence
    pub fn regular(&mut self, target: LevelId, category: impl Into<InfluenceCategory>, payload: T::Payload) {
        self.emit(
            target,
            InfluenceKind::Regular(RegularInfluence::new(category, payload)),
        );
    }

    /// Emit a regular influence to the emitting level itself
    pub fn regular_here(&mut self, category: impl Into<InfluenceCategory>, payload: T::Payload) {
        let target = self.level().clone();
        self.regular(target, category, payload);
    }

    pub fn system(&mut self, target: LevelId, influence: SystemInfluence<T>) {
        self.emit(target, InfluenceKind::System(influence));
    }

    /// Ask for `agent` to join the simulation in `target`
    pub fn add_agent(&mut self, target: LevelId, agent: Agent<T>) {
        self.system(target, SystemInfluence::AddAgent(Box::new(agent)));
    }

    /// Ask for `agent` to leave `target`
    pub fn remove_agent(&mut self, target: LevelId, agent: AgentId) {
        self.system(target, SystemInfluence::RemoveAgent(agent));
    }

    /// Ask for an existing `agent` to start residing in `target`
    pub fn enter_level(
        &mut self,
        target: LevelId,
        agent: AgentId,
        public: T::PublicState,
        private: T::PrivateState,
    ) {
        self.system(target, SystemInfluence::EnterLevel { agent, public, private });
    }

    /// Ask for `agent` to move from `from` to `to`
    pub fn change_level(
        &mut self,
        agent: AgentId,
        from: LevelId,
        to: LevelId,
        public: T::PublicState,
        private: T::PrivateState,
    ) {
        self.system(
            from,
            SystemInfluence::ChangeLevel {
                agent,
                to,
                public,
                private,
            },
        );
    }

    /// Number of influences emitted through this sink so far
    pub fn emitted(&self) -> usize {
        self.buffer.len()
    }
}

//! Structural changes carried by system influences
//!
//! Applied by the engine while building a level's next consistent state,
//! as one phase before or after the level's reaction.

use std::collections::BTreeMap;

use tracing::trace;

use crate::agent::Agent;
use crate::core::error::{KernelError, Result};
use crate::core::types::{AgentId, LevelId};
use crate::influence::{Influence, InfluenceKind, InfluenceSource, Stamped, SystemInfluence};
use crate::level::LevelTopology;
use crate::simulation::model::ModelTypes;
use crate::state::StateBuilder;

/// Apply the system influences of one period, in emission order
///
/// Level changes leave the agent's origin level here and produce an
/// `EnterLevel` cascade for the destination, pushed to `cascades`. An agent
/// leaves the registry once it resides nowhere and no entry is queued for it.
pub(crate) fn apply_system_influences<T: ModelTypes>(
    builder: &mut StateBuilder<'_, T>,
    agents: &mut BTreeMap<AgentId, Agent<T>>,
    topology: &LevelTopology,
    influences: Vec<Stamped<SystemInfluence<T>>>,
    cascades: &mut Vec<Influence<T>>,
) -> Result<()> {
    for stamped in influences {
        let Stamped { produced, value, .. } = stamped;
        let level = builder.level().clone();
        trace!(level = %level, influence = ?value, "Applying system influence");

        match value {
            SystemInfluence::AddAgent(agent) => add_agent(builder, agents, *agent)?,
            SystemInfluence::RemoveAgent(id) => {
                let agent = agents.get_mut(&id).ok_or(KernelError::UnknownAgent(id))?;
                builder.remove_agent(id)?;
                agent.leave(&level);
                if !agent.is_resident_anywhere() && !agent.is_in_transit() {
                    agents.remove(&id);
                }
            }
            SystemInfluence::EnterLevel { agent, public, private } => {
                let resident = agents.get_mut(&agent).ok_or(KernelError::UnknownAgent(agent))?;
                if !resident.has_behavior(&level) {
                    return Err(invalid(agent, &level, "agent has no behavior for this level"));
                }
                builder.insert_agent(agent, public, private)?;
                resident.enter(level);
            }
            SystemInfluence::ChangeLevel {
                agent,
                to,
                public,
                private,
            } => {
                if !topology.can_influence(&level, &to) {
                    return Err(KernelError::UndeclaredInfluenceTarget { from: level, to });
                }
                let moving = agents.get_mut(&agent).ok_or(KernelError::UnknownAgent(agent))?;
                builder.remove_agent(agent)?;
                moving.leave(&level);
                moving.depart_for(to.clone());
                cascades.push(Influence::new(
                    to,
                    produced,
                    InfluenceSource::Reaction { level },
                    InfluenceKind::System(SystemInfluence::EnterLevel { agent, public, private }),
                ));
            }
        }
    }
    Ok(())
}

fn add_agent<T: ModelTypes>(
    builder: &mut StateBuilder<'_, T>,
    agents: &mut BTreeMap<AgentId, Agent<T>>,
    mut agent: Agent<T>,
) -> Result<()> {
    let id = agent.id();
    let level = builder.level().clone();
    if agents.contains_key(&id) {
        return Err(KernelError::AgentAlreadyExists(id));
    }
    if !agent.has_behavior(&level) {
        return Err(invalid(id, &level, "agent has no behavior for this level"));
    }

    let mut pending = agent.take_pending();
    let (public, private) = pending
        .remove(&level)
        .ok_or_else(|| invalid(id, &level, "agent declares no local state for this level"))?;
    if let Some(other) = pending.keys().next() {
        return Err(invalid(
            id,
            &level,
            &format!("agent also declares residence in {other}"),
        ));
    }

    builder.insert_agent(id, public, private)?;
    agent.enter(level);
    agents.insert(id, agent);
    Ok(())
}

fn invalid(agent: AgentId, level: &LevelId, reason: &str) -> KernelError {
    KernelError::InvalidSystemInfluence {
        agent,
        level: level.clone(),
        reason: reason.to_string(),
    }
}

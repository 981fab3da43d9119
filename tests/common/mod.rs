//! Shared fixtures for the integration tests
//!
//! `Counter` models every local state, perception and payload as an `i64`,
//! which is enough to observe what the kernel did with them.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use multilevel_kernel::{
    ActionContext, Agent, AgentBehavior, AgentId, BehaviorError, ConfigError, DecisionContext, Environment,
    InfluenceCategory, InfluenceSink, InfluenceSource, KernelError, Level, LevelId, LevelTopology,
    MemoryRevisionModel, ModelTypes, NaturalActionModel, Owner, PerceptionContext, Probe, ReactionInput,
    ReactionModel, SimulationEngine, SimulationModel, SimulationTime, StateBuilder, SystemPhase,
};
use rand::Rng;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug)]
pub struct Counter;

impl ModelTypes for Counter {
    type PublicState = i64;
    type PrivateState = i64;
    type Memory = Vec<i64>;
    type Perceived = i64;
    type Payload = i64;
    type Parameters = ();
}

pub fn level(name: &str) -> LevelId {
    LevelId::new(name)
}

pub fn periodic(name: &str, period: i64) -> Result<Level<Counter>, ConfigError> {
    Level::periodic(name, period, 0, SimulationTime(0), multilevel_kernel::IdentityReaction::new())
}

type LevelsFn = Box<dyn Fn() -> Result<Vec<Level<Counter>>, ConfigError>>;
type EnvironmentFn = Box<dyn Fn(&LevelTopology) -> Result<Environment<Counter>, ConfigError>>;
type AgentsFn = Box<dyn Fn() -> Result<Vec<Agent<Counter>>, ConfigError>>;

/// Model assembled from closures, one per generator
pub struct TestModel {
    params: (),
    initial: Option<SimulationTime>,
    end: SimulationTime,
    levels: LevelsFn,
    environment: EnvironmentFn,
    agents: AgentsFn,
}

impl TestModel {
    pub fn new(levels: impl Fn() -> Result<Vec<Level<Counter>>, ConfigError> + 'static) -> Self {
        Self {
            params: (),
            initial: Some(SimulationTime(0)),
            end: SimulationTime(5),
            levels: Box::new(levels),
            environment: Box::new(|topology| Ok(flat_environment(topology))),
            agents: Box::new(|| Ok(Vec::new())),
        }
    }

    pub fn with_agents(mut self, agents: impl Fn() -> Result<Vec<Agent<Counter>>, ConfigError> + 'static) -> Self {
        self.agents = Box::new(agents);
        self
    }

    pub fn with_environment(
        mut self,
        environment: impl Fn(&LevelTopology) -> Result<Environment<Counter>, ConfigError> + 'static,
    ) -> Self {
        self.environment = Box::new(environment);
        self
    }

    pub fn ending_at(mut self, ticks: i64) -> Self {
        self.end = SimulationTime(ticks);
        self
    }

    pub fn without_initial_time(mut self) -> Self {
        self.initial = None;
        self
    }
}

impl SimulationModel<Counter> for TestModel {
    fn parameters(&self) -> &() {
        &self.params
    }

    fn initial_time(&self) -> Option<SimulationTime> {
        self.initial
    }

    fn generate_levels(&self, _params: &()) -> Result<Vec<Level<Counter>>, ConfigError> {
        (self.levels)()
    }

    fn generate_environment(&self, _params: &(), levels: &LevelTopology) -> Result<Environment<Counter>, ConfigError> {
        (self.environment)(levels)
    }

    fn generate_agents(&self, _params: &(), _levels: &LevelTopology) -> Result<Vec<Agent<Counter>>, ConfigError> {
        (self.agents)()
    }

    fn is_final_time_or_after(&self, time: SimulationTime, _engine: &SimulationEngine<Counter>) -> bool {
        time >= self.end
    }
}

/// Environment with a zeroed local state in every level and no natural action
pub fn flat_environment(topology: &LevelTopology) -> Environment<Counter> {
    topology
        .ids()
        .iter()
        .fold(Environment::new(), |environment, id| environment.with_level(id.clone(), 0, 0))
}

/// Perceives its own public state, emits nothing
pub struct Idle;

impl AgentBehavior<Counter> for Idle {
    fn perceive(&self, ctx: &mut PerceptionContext<'_, Counter>) -> Result<i64, BehaviorError> {
        Ok(*ctx.public())
    }

    fn decide(
        &self,
        _ctx: &mut DecisionContext<'_, Counter>,
        _influences: &mut InfluenceSink<'_, Counter>,
    ) -> Result<(), BehaviorError> {
        Ok(())
    }
}

/// Sends the start of its period to `target` every round
pub struct Emitter {
    pub target: LevelId,
    pub category: &'static str,
}

impl AgentBehavior<Counter> for Emitter {
    fn perceive(&self, ctx: &mut PerceptionContext<'_, Counter>) -> Result<i64, BehaviorError> {
        Ok(*ctx.public())
    }

    fn decide(
        &self,
        ctx: &mut DecisionContext<'_, Counter>,
        influences: &mut InfluenceSink<'_, Counter>,
    ) -> Result<(), BehaviorError> {
        influences.regular(self.target.clone(), self.category, ctx.time().ticks());
        Ok(())
    }
}

/// Sends its own id as a "digit" to its level
pub struct Announcer;

impl AgentBehavior<Counter> for Announcer {
    fn perceive(&self, ctx: &mut PerceptionContext<'_, Counter>) -> Result<i64, BehaviorError> {
        Ok(*ctx.public())
    }

    fn decide(
        &self,
        ctx: &mut DecisionContext<'_, Counter>,
        influences: &mut InfluenceSink<'_, Counter>,
    ) -> Result<(), BehaviorError> {
        influences.regular_here("digit", ctx.agent().0 as i64);
        Ok(())
    }
}

/// Random "step" drawn from the per-call generator
pub struct Walker;

impl AgentBehavior<Counter> for Walker {
    fn perceive(&self, ctx: &mut PerceptionContext<'_, Counter>) -> Result<i64, BehaviorError> {
        let noise: i64 = ctx.rng().gen_range(0..2);
        Ok(*ctx.public() + noise)
    }

    fn decide(
        &self,
        ctx: &mut DecisionContext<'_, Counter>,
        influences: &mut InfluenceSink<'_, Counter>,
    ) -> Result<(), BehaviorError> {
        let step = ctx.rng().gen_range(-3..=3) + ctx.perceived() % 2;
        influences.regular_here("step", step);
        Ok(())
    }
}

/// Asks for a new agent once its period starts at `at`
///
/// The child removes itself once its own period starts at `leaves_at`.
pub struct Spawner {
    pub at: i64,
    pub child: u64,
    pub leaves_at: i64,
}

impl AgentBehavior<Counter> for Spawner {
    fn perceive(&self, ctx: &mut PerceptionContext<'_, Counter>) -> Result<i64, BehaviorError> {
        Ok(*ctx.public())
    }

    fn decide(
        &self,
        ctx: &mut DecisionContext<'_, Counter>,
        influences: &mut InfluenceSink<'_, Counter>,
    ) -> Result<(), BehaviorError> {
        if ctx.time().ticks() == self.at {
            let child = Agent::new(AgentId(self.child), "child", Vec::new())
                .with_behavior(ctx.level().clone(), Quitter { at: self.leaves_at })
                .residing_in(ctx.level().clone(), 7, 0);
            influences.add_agent(ctx.level().clone(), child);
        }
        Ok(())
    }
}

/// Removes itself once its period starts at `at`
pub struct Quitter {
    pub at: i64,
}

impl AgentBehavior<Counter> for Quitter {
    fn perceive(&self, ctx: &mut PerceptionContext<'_, Counter>) -> Result<i64, BehaviorError> {
        Ok(*ctx.public())
    }

    fn decide(
        &self,
        ctx: &mut DecisionContext<'_, Counter>,
        influences: &mut InfluenceSink<'_, Counter>,
    ) -> Result<(), BehaviorError> {
        if ctx.time().ticks() == self.at {
            influences.remove_agent(ctx.level().clone(), ctx.agent());
        }
        Ok(())
    }
}

/// Moves its agent to `to` once its period starts at `at`
pub struct Traveler {
    pub to: LevelId,
    pub at: i64,
}

impl AgentBehavior<Counter> for Traveler {
    fn perceive(&self, ctx: &mut PerceptionContext<'_, Counter>) -> Result<i64, BehaviorError> {
        Ok(*ctx.public())
    }

    fn decide(
        &self,
        ctx: &mut DecisionContext<'_, Counter>,
        influences: &mut InfluenceSink<'_, Counter>,
    ) -> Result<(), BehaviorError> {
        if ctx.time().ticks() == self.at {
            influences.change_level(
                ctx.agent(),
                ctx.level().clone(),
                self.to.clone(),
                *ctx.public(),
                *ctx.private(),
            );
        }
        Ok(())
    }
}

/// Panics when deciding
pub struct Faulty;

impl AgentBehavior<Counter> for Faulty {
    fn perceive(&self, ctx: &mut PerceptionContext<'_, Counter>) -> Result<i64, BehaviorError> {
        Ok(*ctx.public())
    }

    fn decide(
        &self,
        _ctx: &mut DecisionContext<'_, Counter>,
        _influences: &mut InfluenceSink<'_, Counter>,
    ) -> Result<(), BehaviorError> {
        panic!("decision exploded");
    }
}

/// Appends the sum of a round's perceptions to memory
pub struct SumPerceptions;

impl MemoryRevisionModel<Counter> for SumPerceptions {
    fn revise(
        &self,
        _agent: AgentId,
        memory: &mut Vec<i64>,
        perceived: &BTreeMap<LevelId, i64>,
    ) -> Result<(), BehaviorError> {
        memory.push(perceived.values().sum());
        Ok(())
    }
}

/// Environment action sending the time of the state it sees of `target`
pub struct Watcher {
    pub target: LevelId,
}

impl NaturalActionModel<Counter> for Watcher {
    fn act(
        &self,
        ctx: &mut ActionContext<'_, Counter>,
        influences: &mut InfluenceSink<'_, Counter>,
    ) -> Result<(), BehaviorError> {
        let seen = ctx
            .view(&self.target)
            .ok_or_else(|| format!("{} is not perceptible", self.target))?
            .time()
            .ticks();
        influences.regular_here("seen", seen);
        Ok(())
    }
}

/// Environment action sending a fixed digit
pub struct EnvironmentDigit(pub i64);

impl NaturalActionModel<Counter> for EnvironmentDigit {
    fn act(
        &self,
        _ctx: &mut ActionContext<'_, Counter>,
        influences: &mut InfluenceSink<'_, Counter>,
    ) -> Result<(), BehaviorError> {
        influences.regular_here("digit", self.0);
        Ok(())
    }
}

/// Adds payloads of one category to the environment and to emitting agents
///
/// Rejects influences produced outside the period being closed.
pub struct Accumulate {
    category: InfluenceCategory,
}

impl Accumulate {
    pub fn new(category: &str) -> Self {
        Self {
            category: InfluenceCategory::new(category),
        }
    }
}

impl ReactionModel<Counter> for Accumulate {
    fn handles(&self, category: &InfluenceCategory) -> bool {
        *category == self.category
    }

    fn react(
        &self,
        input: &ReactionInput<'_, Counter>,
        next: &mut StateBuilder<'_, Counter>,
        _cascade: &mut InfluenceSink<'_, Counter>,
    ) -> Result<(), BehaviorError> {
        for influence in input.of_category(&self.category) {
            if !influence.produced.within(&input.period()) {
                return Err(format!("influence produced in {} outside {}", influence.produced, input.period()).into());
            }
            let amount = *influence.payload();
            *next.environment_mut() += amount;
            if let InfluenceSource::Behavior {
                owner: Owner::Agent(id),
                ..
            } = &influence.source
            {
                if let Some(public) = next.agent_mut(*id) {
                    *public += amount;
                }
            }
        }
        Ok(())
    }
}

/// Appends every "digit" payload to the environment's decimal expansion
pub struct Digits;

impl ReactionModel<Counter> for Digits {
    fn handles(&self, category: &InfluenceCategory) -> bool {
        category.as_str() == "digit"
    }

    fn react(
        &self,
        input: &ReactionInput<'_, Counter>,
        next: &mut StateBuilder<'_, Counter>,
        _cascade: &mut InfluenceSink<'_, Counter>,
    ) -> Result<(), BehaviorError> {
        for influence in input.regular {
            let value = *next.environment() * 10 + *influence.payload();
            *next.environment_mut() = value;
        }
        Ok(())
    }
}

/// Writes `agents seen by react * 10 + system influences` to the environment
///
/// Applies structural changes after `react`, so removals are not yet
/// visible to it.
pub struct Headcount;

impl ReactionModel<Counter> for Headcount {
    fn handles(&self, _category: &InfluenceCategory) -> bool {
        false
    }

    fn system_phase(&self) -> SystemPhase {
        SystemPhase::AfterRegular
    }

    fn react(
        &self,
        input: &ReactionInput<'_, Counter>,
        next: &mut StateBuilder<'_, Counter>,
        _cascade: &mut InfluenceSink<'_, Counter>,
    ) -> Result<(), BehaviorError> {
        if input.happens_before {
            return Err("system influences applied before react".into());
        }
        *next.environment_mut() = next.agent_count() as i64 * 10 + input.system.len() as i64;
        Ok(())
    }
}

/// Fails every reaction
pub struct Broken;

impl ReactionModel<Counter> for Broken {
    fn handles(&self, _category: &InfluenceCategory) -> bool {
        true
    }

    fn react(
        &self,
        _input: &ReactionInput<'_, Counter>,
        _next: &mut StateBuilder<'_, Counter>,
        _cascade: &mut InfluenceSink<'_, Counter>,
    ) -> Result<(), BehaviorError> {
        Err("reaction broke".into())
    }
}

/// Probe writing one line per lifecycle hook
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

fn now(engine: &SimulationEngine<Counter>) -> i64 {
    engine.current_time().map_or(-1, SimulationTime::ticks)
}

impl Probe<Counter> for Recorder {
    fn prepare(&mut self) {
        self.push("prepare".into());
    }

    fn observe_initial(&mut self, engine: &SimulationEngine<Counter>) {
        self.push(format!("initial {}", now(engine)));
    }

    fn observe_intermediate(&mut self, engine: &SimulationEngine<Counter>) {
        self.push(format!("round {}", now(engine)));
    }

    fn observe_final(&mut self, engine: &SimulationEngine<Counter>) {
        self.push(format!("final {}", now(engine)));
    }

    fn on_error(&mut self, _error: &KernelError) {
        self.push("error".into());
    }

    fn on_abort(&mut self, engine: &SimulationEngine<Counter>) {
        self.push(format!("abort {}", now(engine)));
    }

    fn end(&mut self) {
        self.push("end".into());
    }
}

type SampleFn<R> = Box<dyn Fn(&SimulationEngine<Counter>) -> R + Send>;

/// Probe sampling the engine after initialization and after every round
pub struct Sampler<R> {
    samples: Arc<Mutex<Vec<R>>>,
    sample: SampleFn<R>,
}

impl<R: Send + 'static> Sampler<R> {
    pub fn new(sample: impl Fn(&SimulationEngine<Counter>) -> R + Send + 'static) -> (Self, Arc<Mutex<Vec<R>>>) {
        let samples = Arc::new(Mutex::new(Vec::new()));
        let probe = Self {
            samples: Arc::clone(&samples),
            sample: Box::new(sample),
        };
        (probe, samples)
    }
}

impl<R: Send + 'static> Probe<Counter> for Sampler<R> {
    fn observe_initial(&mut self, engine: &SimulationEngine<Counter>) {
        let value = (self.sample)(engine);
        self.samples.lock().unwrap().push(value);
    }

    fn observe_intermediate(&mut self, engine: &SimulationEngine<Counter>) {
        let value = (self.sample)(engine);
        self.samples.lock().unwrap().push(value);
    }
}

// caisse-flow/src/flow/execution.rs

use crate::context::ContextData;
use crate::control::{FlowOutcome, StepControl};
use crate::error::FlowError;
use crate::flow::definition::{Flow, Handler};
use crate::step::StepDef;
use tracing::{event, instrument, Instrument, Level};

enum PhaseResult<Err> {
  Continue,
  Stop,
  Failed(Err),
}

impl<T, Err> Flow<T, Err>
where
  T: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Runs every step in order against `ctx_data`.
  ///
  /// A required step with no handlers yields `FlowError::HandlerMissing`
  /// (converted into `Err`). A failing handler on a required step aborts the
  /// run with its error; on an optional step the error is logged and the run
  /// moves to the next step.
  #[instrument(
    name = "Flow::run",
    skip_all,
    fields(flow = %self.name, num_steps = self.steps.len()),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<T>) -> Result<FlowOutcome, Err> {
    event!(Level::DEBUG, "Flow starting.");

    for (step_idx, step) in self.steps.iter().enumerate() {
      let step_span = tracing::info_span!("flow_step", step = %step.name, index = step_idx, optional = step.optional);

      if let Some(skip_if) = &step.skip_if {
        if skip_if(&ctx_data) {
          event!(parent: &step_span, Level::DEBUG, "Step skipped by condition.");
          continue;
        }
      }

      if self.handler_count(&step.name) == 0 {
        if step.optional {
          event!(parent: &step_span, Level::DEBUG, "Optional step has no handlers.");
          continue;
        }
        event!(parent: &step_span, Level::ERROR, "Required step has no handlers.");
        return Err(Err::from(FlowError::HandlerMissing {
          step_name: step.name.clone(),
        }));
      }

      match self.run_step(step, &ctx_data).instrument(step_span.clone()).await {
        PhaseResult::Continue => {}
        PhaseResult::Stop => {
          event!(parent: &step_span, Level::INFO, "Flow stopped by handler.");
          return Ok(FlowOutcome::Stopped);
        }
        PhaseResult::Failed(e) if step.optional => {
          event!(parent: &step_span, Level::WARN, error = %e, "Optional step failed, continuing.");
        }
        PhaseResult::Failed(e) => return Err(e),
      }
    }

    event!(Level::DEBUG, "Flow completed.");
    Ok(FlowOutcome::Completed)
  }

  async fn run_step(&self, step: &StepDef<T>, ctx_data: &ContextData<T>) -> PhaseResult<Err> {
    for (phase, table) in [("before", &self.before), ("on", &self.on), ("after", &self.after)] {
      let Some(handlers) = table.get(&step.name) else {
        continue;
      };
      match run_handlers(phase, handlers, ctx_data).await {
        PhaseResult::Continue => {}
        other => return other,
      }
    }
    PhaseResult::Continue
  }
}

async fn run_handlers<T, Err>(phase: &str, handlers: &[Handler<T, Err>], ctx_data: &ContextData<T>) -> PhaseResult<Err>
where
  T: 'static + Send + Sync,
  Err: std::error::Error + Send + Sync + 'static,
{
  for (handler_idx, handler) in handlers.iter().enumerate() {
    match handler(ctx_data.clone()).await {
      Ok(StepControl::Continue) => {}
      Ok(StepControl::Stop) => {
        event!(Level::DEBUG, phase, handler_idx, "Handler returned Stop.");
        return PhaseResult::Stop;
      }
      Err(e) => {
        event!(Level::ERROR, phase, handler_idx, error = %e, "Handler failed.");
        return PhaseResult::Failed(e);
      }
    }
  }
  PhaseResult::Continue
}

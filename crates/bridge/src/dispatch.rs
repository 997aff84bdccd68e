//! Operation dispatch.

use bytes::Bytes;
use fail::fail_point;

use crate::{
    context::CallContext,
    error::{Fault, Stage},
    operation::OperationRequest,
    session::Session,
};

/// Runs `request` on `session` and returns the raw ledger payload.
///
/// Reads are evaluated against current state; writes are submitted and only
/// return once the ledger has accepted or rejected them. Exactly one attempt is
/// made. Arguments are passed positionally and are not validated here; the
/// contract is the authority on their count and meaning.
///
/// # Errors
///
/// - [`FaultKind::TransactionFailure`](crate::FaultKind::TransactionFailure) if the ledger
///   rejects the transaction
/// - [`FaultKind::ConnectionFailure`](crate::FaultKind::ConnectionFailure) if the connection
///   dropped mid-call
/// - `Timeout` / `Cancelled` if a bound fires
#[tracing::instrument(
    skip_all,
    fields(
        operation = request.name(),
        mode = %request.mode(),
        channel = session.channel(),
        contract = session.contract_name(),
    )
)]
pub async fn dispatch(
    session: &Session,
    request: &OperationRequest,
    ctx: &CallContext,
) -> Result<Bytes, Fault> {
    fail_point!("dispatch-before-invoke", |_| {
        let stage = match request.mode() {
            crate::operation::Mode::Read => Stage::Evaluate,
            crate::operation::Mode::Write => Stage::Submit,
        };
        Err(Fault::new(
            crate::error::FaultKind::TransactionFailure,
            stage,
            "injected failure before invoke",
        ))
    });

    let name = request.name();
    let args = request.args();
    let contract = session.contract();
    session.metrics().record_invocation(request.mode());

    let result = match request {
        OperationRequest::QueryBook { .. } => {
            ctx.run(Stage::Evaluate, ctx.bound(session.evaluate_timeout()), async {
                contract
                    .evaluate_transaction(name, &args)
                    .await
                    .map_err(|e| Fault::from_gateway(Stage::Evaluate, &e))
            })
            .await
        },
        OperationRequest::CreateBook(_) => {
            ctx.run(Stage::Submit, ctx.bound(session.submit_timeout()), async {
                contract
                    .submit_transaction(name, &args)
                    .await
                    .map_err(|e| Fault::from_gateway(Stage::Submit, &e))
            })
            .await
        },
    };

    match &result {
        Ok(payload) => tracing::debug!(bytes = payload.len(), "transaction completed"),
        Err(fault) => {
            tracing::error!(kind = %fault.kind(), error = %fault.message(), "transaction failed");
        },
    }

    result
}

use campusdesk_core::Aggregate;

/// Decide and apply in one step.
///
/// `handle` runs first and rejects the command without touching state;
/// only when it succeeds are the resulting events applied in order. The
/// applied events are returned so callers can derive side effects from them.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: Aggregate,
{
    let events = aggregate.handle(command)?;
    for ev in &events {
        aggregate.apply(ev);
    }
    Ok(events)
}

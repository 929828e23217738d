use usync_schemas::{Account, AccountSet};

use crate::{AccountUpdate, ChangedField, ReconcilePlan};

fn changed_fields(applied: &Account, desired: &Account) -> Vec<ChangedField> {
    let mut changed = Vec::new();
    if applied.password != desired.password {
        changed.push(ChangedField::Password);
    }
    if applied.level != desired.level {
        changed.push(ChangedField::Level);
    }
    if applied.inbound_tag != desired.inbound_tag {
        changed.push(ChangedField::InboundTag);
    }
    changed
}

/// Diff `desired` against `applied`:
/// - desired only => add
/// - both, record differs => update (remove then add)
/// - applied only => remove
pub fn plan(desired: &AccountSet, applied: &AccountSet) -> ReconcilePlan {
    let mut out = ReconcilePlan::default();

    for want in desired.iter() {
        match applied.get(&want.email) {
            None => out.adds.push(want.clone()),
            Some(have) => {
                let changed = changed_fields(have, want);
                if changed.is_empty() {
                    out.unchanged += 1;
                } else {
                    out.updates.push(AccountUpdate {
                        previous: have.clone(),
                        next: want.clone(),
                        changed,
                    });
                }
            }
        }
    }

    for have in applied.iter() {
        if !desired.contains(&have.email) {
            out.removes.push(have.clone());
        }
    }

    out
}

/// True when applying `desired` on top of `applied` needs no mutation.
pub fn is_converged(desired: &AccountSet, applied: &AccountSet) -> bool {
    plan(desired, applied).is_empty()
}

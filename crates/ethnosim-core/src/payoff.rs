//! Tag-conditioned cooperation rule.

use crate::Agent;

/// Whether `actor` helps `partner`: in-group bit for a shared tag, out-group bit otherwise.
#[must_use]
pub fn cooperates(actor: &Agent, partner: &Agent) -> bool {
    if actor.tag == partner.tag {
        actor.ig
    } else {
        actor.og
    }
}

/// Which directions transferred PTR during one encounter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Encounter {
    /// `actor` paid the cost and `partner` received the benefit.
    pub actor_gave: bool,
    /// `partner` paid the cost and `actor` received the benefit.
    pub partner_gave: bool,
}

impl Encounter {
    #[must_use]
    pub fn transfers(&self) -> usize {
        usize::from(self.actor_gave) + usize::from(self.partner_gave)
    }
}

/// Evaluate both directions of one neighbor encounter and apply the PTR transfers.
///
/// Decisions depend only on tags and cooperation bits, so the two directions
/// are independent of each other's outcome.
pub fn encounter(actor: &mut Agent, partner: &mut Agent, cost: f32, benefit: f32) -> Encounter {
    let outcome = Encounter {
        actor_gave: cooperates(actor, partner),
        partner_gave: cooperates(partner, actor),
    };
    if outcome.actor_gave {
        actor.ptr -= cost;
        partner.ptr += benefit;
    }
    if outcome.partner_gave {
        partner.ptr -= cost;
        actor.ptr += benefit;
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Phenotype;

    fn agent(tag: u8, phenotype: Phenotype) -> Agent {
        Agent::with_phenotype(tag, phenotype, 0.12)
    }

    #[test]
    fn ethnocentrics_help_only_their_own_tag() {
        let a = agent(0, Phenotype::Ethnocentric);
        assert!(cooperates(&a, &agent(0, Phenotype::Egoist)));
        assert!(!cooperates(&a, &agent(1, Phenotype::Altruist)));
    }

    #[test]
    fn traitors_help_only_other_tags() {
        let t = agent(2, Phenotype::Traitor);
        assert!(!cooperates(&t, &agent(2, Phenotype::Altruist)));
        assert!(cooperates(&t, &agent(3, Phenotype::Egoist)));
    }

    #[test]
    fn encounter_is_directional() {
        let mut altruist = agent(0, Phenotype::Altruist);
        let mut egoist = agent(1, Phenotype::Egoist);
        let outcome = encounter(&mut altruist, &mut egoist, 0.01, 0.03);
        assert!(outcome.actor_gave);
        assert!(!outcome.partner_gave);
        assert_eq!(outcome.transfers(), 1);
        assert!((altruist.ptr - 0.11).abs() < 1e-6);
        assert!((egoist.ptr - 0.15).abs() < 1e-6);
    }

    #[test]
    fn mutual_cooperation_nets_benefit_minus_cost() {
        let mut a = agent(1, Phenotype::Ethnocentric);
        let mut b = agent(1, Phenotype::Altruist);
        let outcome = encounter(&mut a, &mut b, 0.01, 0.03);
        assert_eq!(outcome.transfers(), 2);
        assert!((a.ptr - 0.14).abs() < 1e-6);
        assert!((b.ptr - 0.14).abs() < 1e-6);
    }

    #[test]
    fn egoists_never_transfer() {
        let mut a = agent(0, Phenotype::Egoist);
        let mut b = agent(0, Phenotype::Egoist);
        assert_eq!(encounter(&mut a, &mut b, 0.01, 0.03), Encounter::default());
        assert_eq!(a.ptr, 0.12);
    }
}

use crate::error::EvaluationError;
use crate::node::Node;

/// Runs a puzzle program against its solution to produce a condition list.
pub trait Evaluator {
    fn run(
        &self,
        program: &Node,
        solution: &Node,
        cost_limit: u64,
    ) -> Result<Node, EvaluationError>;
}

/// Cost charged for evaluating a quote.
pub const QUOTE_COST: u64 = 20;

/// Evaluator for quoted programs `(q . x)`, which return `x` and ignore the
/// solution. Enough for pay-to-conditions puzzles; anything else fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuoteEvaluator;

impl Evaluator for QuoteEvaluator {
    fn run(
        &self,
        program: &Node,
        _solution: &Node,
        cost_limit: u64,
    ) -> Result<Node, EvaluationError> {
        let (op, body) = program
            .as_pair()
            .ok_or_else(|| EvaluationError::Failed("atom program".into()))?;
        if op.as_atom() != Some(&[1u8][..]) {
            return Err(EvaluationError::Failed(format!("unsupported operator {op}")));
        }
        if cost_limit < QUOTE_COST {
            return Err(EvaluationError::CostExceeded(cost_limit));
        }
        Ok(body.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_returns_body() {
        let body = Node::list(vec![Node::from_int(51), Node::atom(vec![9; 32])]);
        let program = Node::pair(Node::from_int(1), body.clone());
        assert_eq!(QuoteEvaluator.run(&program, &Node::nil(), 100), Ok(body));
    }

    #[test]
    fn quote_failures() {
        let program = Node::pair(Node::from_int(1), Node::nil());
        assert_eq!(
            QuoteEvaluator.run(&program, &Node::nil(), QUOTE_COST - 1),
            Err(EvaluationError::CostExceeded(QUOTE_COST - 1))
        );
        assert!(QuoteEvaluator.run(&Node::from_int(1), &Node::nil(), 100).is_err());
        let apply = Node::pair(Node::from_int(2), Node::nil());
        assert!(QuoteEvaluator.run(&apply, &Node::nil(), 100).is_err());
    }
}

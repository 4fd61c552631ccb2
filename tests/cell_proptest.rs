//! Model-based test: random operation sequences against a reference model
//! of the state machine, checking the tag and the last-write-wins payload
//! after every step.

use proptest::prelude::*;

use tricell::{AsyncCell, AsyncState, Progress};

#[derive(Debug, Clone)]
enum Op {
    Value(u8),
    Error(u8),
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Model {
    Value(u8),
    Error(u8),
    Progress,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u8>().prop_map(Op::Value),
        any::<u8>().prop_map(Op::Error),
        Just(Op::Start),
        Just(Op::Stop),
    ]
}

proptest! {
    #[test]
    fn cell_matches_model(ops in proptest::collection::vec(op_strategy(), 1..64)) {
        let cell: AsyncCell<u8, u8> = AsyncCell::with_value(0);
        let mut model = Model::Value(0);

        for op in ops {
            match op {
                Op::Value(v) => {
                    cell.set_value(v);
                    model = Model::Value(v);
                }
                Op::Error(e) => {
                    cell.set_error(e);
                    model = Model::Error(e);
                }
                // Ops whose preconditions the model says would be violated
                // are skipped; the panic paths have dedicated tests.
                Op::Start if model != Model::Progress => {
                    cell.start_progress(Progress::new());
                    model = Model::Progress;
                }
                Op::Stop if model != Model::Progress => {
                    cell.stop_progress(None);
                }
                Op::Start | Op::Stop => {}
            }

            // Exactly one payload is observable, and it matches the tag.
            let dispatched = cell.access(
                |v| Model::Value(*v),
                |e| Model::Error(*e),
                |_| Model::Progress,
            );
            prop_assert_eq!(dispatched, model);
            prop_assert_eq!(
                cell.state(),
                match model {
                    Model::Value(_) => AsyncState::Value,
                    Model::Error(_) => AsyncState::Error,
                    Model::Progress => AsyncState::Progress,
                }
            );
        }

        // Leave the cell terminal; dropping it mid-computation is a
        // contract violation by design.
        cell.set_value(0);
    }
}

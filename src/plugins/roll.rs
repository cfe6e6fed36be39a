use std::sync::Arc;

use rand::Rng;

use crate::registry::{CommandDecl, CommandModule, Context, HandlerResult, handler};

const DEFAULT_MIN: u64 = 1;
const DEFAULT_MAX: u64 = 6;

pub struct Roll;

/// Range from `/roll [min] [max]`. Non-numeric arguments fall back to the
/// defaults and a reversed range is swapped.
fn range(args: &[String]) -> (u64, u64) {
    let number = |index: usize, default: u64| {
        args.get(index)
            .filter(|a| !a.is_empty() && a.chars().all(|c| c.is_ascii_digit()))
            .and_then(|a| a.parse().ok())
            .unwrap_or(default)
    };

    let min = number(0, DEFAULT_MIN);
    let max = number(1, DEFAULT_MAX);
    if min > max { (max, min) } else { (min, max) }
}

/// Zero-pad `value` to the width of `max`.
fn pad(value: u64, max: u64) -> String {
    let width = max.to_string().len();
    format!("{value:0>width$}")
}

impl Roll {
    async fn roll(&self, ctx: Context) -> HandlerResult {
        let (min, max) = range(&ctx.args);
        let value = rand::thread_rng().gen_range(min..=max);

        ctx.reply(pad(value, max)).await?;
        Ok(())
    }
}

impl CommandModule for Roll {
    fn group(&self) -> &'static str {
        "Misc"
    }

    fn commands(self: Arc<Self>) -> Vec<CommandDecl> {
        vec![
            CommandDecl::new(handler!(self, roll))
                .title("Rolling Dice")
                .description("Roll a number between 1 and 6 or give me another range")
                .args(["min", "max"]),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_range() {
        assert_eq!(range(&[]), (1, 6));
        assert_eq!(range(&args(&["3"])), (3, 6));
        assert_eq!(range(&args(&["10", "200"])), (10, 200));
        assert_eq!(range(&args(&["-4", "x"])), (1, 6));
        assert_eq!(range(&args(&["20", "5"])), (5, 20));
    }

    #[test]
    fn test_pad() {
        assert_eq!(pad(7, 100), "007");
        assert_eq!(pad(42, 99), "42");
        assert_eq!(pad(3, 6), "3");
    }
}

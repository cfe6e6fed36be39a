use std::sync::Arc;

use rand::Rng;

use crate::registry::{CommandDecl, CommandModule, Context, HandlerResult, handler};

pub struct Decide;

impl Decide {
    async fn decide(&self, ctx: Context) -> HandlerResult {
        let answer = if rand::thread_rng().gen_bool(0.5) { "Yes" } else { "No" };
        ctx.reply(answer).await?;
        Ok(())
    }
}

impl CommandModule for Decide {
    fn group(&self) -> &'static str {
        "Misc"
    }

    fn commands(self: Arc<Self>) -> Vec<CommandDecl> {
        vec![
            CommandDecl::new(handler!(self, decide))
                .title("Decide")
                .description("Let me decide for you: Yes or No"),
        ]
    }
}

//! Script execution.

use log::debug;

use super::directive::Directive;
use super::response::Exchange;
use super::session::Session;
use crate::error::Result;
use crate::transport::Transport;

impl<T: Transport> Session<T> {
    /// Run a command script, one directive per line, in order.
    ///
    /// `on_exchange` sees each exchange as soon as it completes, so a
    /// transcript survives a later failure. The first error (including one
    /// returned by `on_exchange`) stops the script; nothing after it is sent.
    pub async fn execute_script<I, S, F>(
        &mut self,
        lines: I,
        mut on_exchange: F,
    ) -> Result<Vec<Exchange>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(&Exchange) -> Result<()>,
    {
        let mut exchanges = Vec::new();
        let mut resync_next = false;

        for line in lines {
            let directive = match Directive::parse(line.as_ref())? {
                Directive::Comment => continue,
                Directive::PromptChange => {
                    resync_next = true;
                    continue;
                }
                directive => directive,
            };

            // the flagged command may end at a prompt with a different host part
            if resync_next {
                self.reset_prompt();
            }

            let exchange = match directive {
                Directive::Timed(timed) => self.timed_exchange(&timed).await?,
                Directive::Command(command) => self.send_command(&command).await?,
                Directive::Comment | Directive::PromptChange => continue,
            };

            on_exchange(&exchange)?;
            exchanges.push(exchange);

            if resync_next {
                resync_next = false;
                debug!("{}: prompt may have changed, resynchronizing", self.hostname());
                self.synchronize().await?;
            }
        }

        Ok(exchanges)
    }
}

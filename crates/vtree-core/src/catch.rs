use crate::diff::Reconciler;
use crate::error::{ErrorInfo, Thrown};
use crate::host::HostTree;
use crate::tree::NodeId;

impl<H: HostTree> Reconciler<'_, H> {
    /// Offers `thrown` to each component ancestor of `from`, innermost
    /// first. The first one that queues itself for a re-render absorbs it.
    /// Ancestors already re-rendering because of an earlier error are
    /// skipped. A boundary that fails while handling replaces the error
    /// carried further up.
    ///
    /// `Err` means no ancestor took it.
    pub(crate) fn catch_error(&mut self, thrown: Thrown, from: NodeId) -> Result<(), Thrown> {
        let mut thrown = thrown;
        let mut cur = self.tree.get(from).and_then(|f| f.parent);

        while let Some(id) = cur {
            let Some(fiber) = self.tree.get(id) else { break };
            let next = fiber.parent;
            if let Some(c) = fiber.component.clone()
                && !c.processing_exception.get()
            {
                let info = ErrorInfo {
                    component_stack: self.tree.component_stack(from),
                };
                match c.try_catch(&thrown, &info) {
                    Ok(true) => {
                        c.pending_error.set(true);
                        let name = c.name();
                        log::debug!("{name} caught {thrown:?}");
                        self.options.observe(|o| o.caught(&thrown, &name));
                        return Ok(());
                    }
                    Ok(false) => {}
                    Err(e) => thrown = Thrown::Error(e),
                }
            }
            cur = next;
        }

        if self.unhandled_stack.is_none() {
            self.unhandled_stack = Some(self.tree.component_stack(from));
        }
        log::error!("unhandled {thrown:?}");
        Err(thrown)
    }
}

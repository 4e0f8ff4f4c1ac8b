use crate::diff::Reconciler;
use crate::error::Thrown;
use crate::host::HostTree;
use crate::refs::{NodeRef, RefValue};
use crate::tree::NodeId;

impl<H: HostTree> Reconciler<'_, H> {
    /// Runs the render callbacks collected during the pass rooted at `root`
    /// (did_mount/did_update, layout effects, set_state callbacks), in
    /// the order instances finished diffing.
    ///
    /// A failing callback is routed to the boundaries above its instance and
    /// the remaining instances still run. The first error nobody handled is
    /// returned.
    pub(crate) fn commit_root(&mut self, root: NodeId) -> Result<(), Thrown> {
        let queue = std::mem::take(&mut self.commit_queue);
        if let Some(f) = self.tree.get(root) {
            let vnode = f.vnode.clone();
            self.options.observe(|o| o.commit(&vnode, queue.len()));
        }

        let mut unhandled = None;
        for c in queue {
            if let Err(e) = c.run_render_callbacks() {
                log::debug!("{}: commit callback failed: {e}", c.name());
                let at = c.vnode().unwrap_or(root);
                if let Err(t) = self.catch_error(Thrown::Error(e), at)
                    && unhandled.is_none()
                {
                    unhandled = Some(t);
                }
            }
        }
        match unhandled {
            Some(t) => Err(t),
            None => Ok(()),
        }
    }

    /// Points `node_ref` at `value`. A failing callback ref is routed to the
    /// boundaries above `owner`.
    pub(crate) fn apply_ref(
        &mut self,
        node_ref: &NodeRef,
        value: Option<RefValue>,
        owner: NodeId,
    ) -> Result<(), Thrown> {
        match node_ref.assign(value) {
            Ok(()) => Ok(()),
            Err(e) => self.catch_error(Thrown::Error(e), owner),
        }
    }
}

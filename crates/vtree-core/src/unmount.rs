use crate::diff::Reconciler;
use crate::error::Thrown;
use crate::host::HostTree;
use crate::tree::NodeId;

impl<H: HostTree> Reconciler<'_, H> {
    /// Tears down the subtree at `id` and frees its fibers.
    ///
    /// Refs are detached (box refs only when they still point here),
    /// instances get their cleanup, and host nodes are removed. Below a
    /// removed element nothing is removed individually, except the output of
    /// portals, which sits in its own container. Teardown errors go
    /// to the boundaries above `boundary_from` and never stop the walk.
    pub(crate) fn unmount(&mut self, id: NodeId, boundary_from: NodeId, skip_remove: bool) {
        let Some(fiber) = self.tree.get(id) else { return };
        let vnode = fiber.vnode.clone();
        let dom = fiber.dom.clone();
        let component = fiber.component.clone();
        let is_host = !fiber.is_component();
        let is_portal = fiber.is_portal();
        self.options.observe(|o| o.unmount(&vnode));

        if let Some(r) = vnode.node_ref()
            && r.detachable_from(if is_host { dom.as_ref() } else { None })
            && let Err(t) = self.apply_ref(r, None, boundary_from)
        {
            log::error!("ref detach failed during unmount: {t:?}");
        }

        if let Some(c) = component {
            for e in c.teardown() {
                log::debug!("{}: teardown failed: {e}", c.name());
                if let Err(t) = self.catch_error(Thrown::Error(e), boundary_from) {
                    log::error!("unhandled teardown error: {t:?}");
                }
            }
        }

        let children = self
            .tree
            .get_mut(id)
            .map(|f| std::mem::take(&mut f.children))
            .unwrap_or_default();
        let removes_self = is_host && dom.is_some() && !skip_remove;
        // Portal output lives in another container, so removing an
        // ancestor element does not take it along.
        let skip_children = !is_portal && (skip_remove || (is_host && dom.is_some()));
        for c in children.into_iter().flatten() {
            self.unmount(c, boundary_from, skip_children);
        }

        if is_host && let Some(d) = &dom {
            self.tree.listeners.remove(d);
            if removes_self {
                self.host.remove(d);
            }
        }
        self.tree.remove(id);
    }
}

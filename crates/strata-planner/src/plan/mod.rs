//! Node arena and lifecycle dispatch.
//!
//! Every plan node lives in one [`Arena`] slot and refers to other nodes by
//! [`NodeId`]. Driving a node takes it out of its slot for the duration of
//! the call, so a node can freely drive its sources through the same arena.

mod cache;

pub(crate) use cache::{CacheId, RowCache};

use strata_query::Document;
use strata_store::Datastore;

use crate::error::PlannerError;
use crate::filter::Filter;
use crate::nodes::{
    AggregateNode, CreateNode, DagScanNode, DeleteNode, GroupNode, HeadsetNode, LimitNode, MultiScanNode,
    OrderNode, ParallelNode, PipeNode, ScanNode, SelectNode, SelectTopNode, TopLevelNode, TypeJoinNode, UpdateNode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Scan,
    Select,
    SelectTop,
    TypeJoin,
    Group,
    Pipe,
    MultiScan,
    Parallel,
    Count,
    Sum,
    Average,
    Order,
    Limit,
    DagScan,
    Headset,
    TopLevel,
    Create,
    Update,
    Delete,
}

impl NodeKind {
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Scan => "scanNode",
            NodeKind::Select => "selectNode",
            NodeKind::SelectTop => "selectTopNode",
            NodeKind::TypeJoin => "typeIndexJoin",
            NodeKind::Group => "groupNode",
            NodeKind::Pipe => "pipeNode",
            NodeKind::MultiScan => "multiScanNode",
            NodeKind::Parallel => "parallelNode",
            NodeKind::Count => "countNode",
            NodeKind::Sum => "sumNode",
            NodeKind::Average => "averageNode",
            NodeKind::Order => "orderNode",
            NodeKind::Limit => "limitNode",
            NodeKind::DagScan => "dagScanNode",
            NodeKind::Headset => "headsetNode",
            NodeKind::TopLevel => "topLevelNode",
            NodeKind::Create => "createNode",
            NodeKind::Update => "updateNode",
            NodeKind::Delete => "deleteNode",
        }
    }
}

pub enum PlanNode<'t> {
    Scan(ScanNode<'t>),
    Select(SelectNode),
    SelectTop(SelectTopNode),
    TypeJoin(TypeJoinNode),
    Group(GroupNode),
    Pipe(PipeNode),
    MultiScan(MultiScanNode),
    Parallel(ParallelNode),
    Aggregate(AggregateNode),
    Order(OrderNode),
    Limit(LimitNode),
    DagScan(DagScanNode),
    Headset(HeadsetNode<'t>),
    TopLevel(TopLevelNode),
    Create(CreateNode),
    Update(UpdateNode),
    Delete(DeleteNode),
}

impl PlanNode<'_> {
    pub fn kind(&self) -> NodeKind {
        match self {
            PlanNode::Scan(_) => NodeKind::Scan,
            PlanNode::Select(_) => NodeKind::Select,
            PlanNode::SelectTop(_) => NodeKind::SelectTop,
            PlanNode::TypeJoin(_) => NodeKind::TypeJoin,
            PlanNode::Group(_) => NodeKind::Group,
            PlanNode::Pipe(_) => NodeKind::Pipe,
            PlanNode::MultiScan(_) => NodeKind::MultiScan,
            PlanNode::Parallel(_) => NodeKind::Parallel,
            PlanNode::Aggregate(n) => n.kind(),
            PlanNode::Order(_) => NodeKind::Order,
            PlanNode::Limit(_) => NodeKind::Limit,
            PlanNode::DagScan(_) => NodeKind::DagScan,
            PlanNode::Headset(_) => NodeKind::Headset,
            PlanNode::TopLevel(_) => NodeKind::TopLevel,
            PlanNode::Create(_) => NodeKind::Create,
            PlanNode::Update(_) => NodeKind::Update,
            PlanNode::Delete(_) => NodeKind::Delete,
        }
    }

    /// The primary data source, for generic chain walks.
    pub fn source(&self) -> Option<NodeId> {
        match self {
            PlanNode::Scan(_) | PlanNode::Headset(_) | PlanNode::Pipe(_) => None,
            PlanNode::Parallel(_) | PlanNode::TopLevel(_) => None,
            PlanNode::Select(n) => Some(n.source),
            PlanNode::SelectTop(n) => n.plan,
            PlanNode::TypeJoin(n) => Some(n.root),
            PlanNode::Group(n) => n.source,
            PlanNode::MultiScan(n) => Some(n.source),
            PlanNode::Aggregate(n) => n.source,
            PlanNode::Order(n) => n.source,
            PlanNode::Limit(n) => n.source,
            PlanNode::DagScan(n) => n.headset,
            PlanNode::Create(n) => Some(n.select),
            PlanNode::Update(n) => Some(n.select),
            PlanNode::Delete(n) => Some(n.select),
        }
    }

    /// Secondary children that are not on the primary chain.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            PlanNode::TypeJoin(n) => vec![n.sub],
            PlanNode::Group(n) => n.children.iter().filter_map(|c| c.plan).collect(),
            PlanNode::Parallel(n) => n.children.clone(),
            PlanNode::TopLevel(n) => n.children.iter().map(|(_, id)| *id).collect(),
            PlanNode::Update(n) => vec![n.matcher],
            PlanNode::Delete(n) => vec![n.matcher],
            _ => Vec::new(),
        }
    }

    fn set_source(&mut self, new: NodeId) -> bool {
        let slot = match self {
            PlanNode::Select(n) => &mut n.source,
            PlanNode::TypeJoin(n) => &mut n.root,
            PlanNode::MultiScan(n) => &mut n.source,
            PlanNode::Group(n) => return n.source.replace(new).is_some(),
            PlanNode::Aggregate(n) => return n.source.replace(new).is_some(),
            PlanNode::Order(n) => return n.source.replace(new).is_some(),
            PlanNode::Limit(n) => return n.source.replace(new).is_some(),
            _ => return false,
        };
        *slot = new;
        true
    }
}

pub struct Arena<'t> {
    ds: &'t dyn Datastore,
    nodes: Vec<Option<PlanNode<'t>>>,
    caches: Vec<RowCache>,
    iterations: Vec<u64>,
}

impl<'t> Arena<'t> {
    pub fn new(ds: &'t dyn Datastore) -> Self {
        Self {
            ds,
            nodes: Vec::new(),
            caches: Vec::new(),
            iterations: Vec::new(),
        }
    }

    pub fn ds(&self) -> &'t dyn Datastore {
        self.ds
    }

    pub fn push(&mut self, node: PlanNode<'t>) -> NodeId {
        self.nodes.push(Some(node));
        self.iterations.push(0);
        NodeId(self.nodes.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Result<&PlanNode<'t>, PlannerError> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(PlannerError::NodeUnavailable(id))
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Result<&mut PlanNode<'t>, PlannerError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(PlannerError::NodeUnavailable(id))
    }

    /// Take the node out of its slot, run `f`, and put it back.
    fn with<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut PlanNode<'t>, &mut Self) -> Result<R, PlannerError>,
    ) -> Result<R, PlannerError> {
        let mut node = self
            .nodes
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(PlannerError::NodeUnavailable(id))?;
        let out = f(&mut node, self);
        self.nodes[id.0] = Some(node);
        out
    }

    pub fn kind(&self, id: NodeId) -> Result<NodeKind, PlannerError> {
        Ok(self.get(id)?.kind())
    }

    pub fn source(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).ok().and_then(PlanNode::source)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.get(id).map(PlanNode::children).unwrap_or_default()
    }

    pub(crate) fn set_source(&mut self, id: NodeId, new: NodeId) -> Result<bool, PlannerError> {
        Ok(self.get_mut(id)?.set_source(new))
    }

    pub fn iterations(&self, id: NodeId) -> u64 {
        self.iterations.get(id.0).copied().unwrap_or(0)
    }

    // ── Lifecycle ───────────────────────────────────────────

    /// Reset iteration state. Safe to call again, including after close.
    pub fn init(&mut self, id: NodeId) -> Result<(), PlannerError> {
        self.with(id, |node, arena| match node {
            PlanNode::Scan(n) => n.init(),
            PlanNode::Select(n) => n.init(arena),
            PlanNode::SelectTop(n) => arena.init(n.plan()?),
            PlanNode::TypeJoin(n) => n.init(arena),
            PlanNode::Group(n) => n.init(arena),
            PlanNode::Pipe(n) => n.init(arena),
            PlanNode::MultiScan(n) => n.init(arena),
            PlanNode::Parallel(n) => n.init(arena),
            PlanNode::Aggregate(n) => n.init(arena),
            PlanNode::Order(n) => n.init(arena),
            PlanNode::Limit(n) => n.init(arena),
            PlanNode::DagScan(n) => n.init(arena),
            PlanNode::Headset(n) => n.init(),
            PlanNode::TopLevel(n) => n.init(arena),
            PlanNode::Create(n) => n.init(),
            PlanNode::Update(n) => n.init(arena),
            PlanNode::Delete(n) => n.init(arena),
        })
    }

    pub fn start(&mut self, id: NodeId) -> Result<(), PlannerError> {
        self.with(id, |node, arena| match node {
            PlanNode::Scan(_) | PlanNode::Headset(_) | PlanNode::Pipe(_) => Ok(()),
            PlanNode::Create(_) => Ok(()),
            PlanNode::SelectTop(n) => arena.start(n.plan()?),
            PlanNode::Select(n) => arena.start(n.source),
            PlanNode::TypeJoin(n) => arena.start(n.root),
            PlanNode::MultiScan(n) => n.start(arena),
            PlanNode::Group(n) => n.start(arena),
            PlanNode::Parallel(n) => n.children.iter().try_for_each(|c| arena.start(*c)),
            PlanNode::TopLevel(n) => n.children.iter().try_for_each(|(_, c)| arena.start(*c)),
            PlanNode::Aggregate(n) => arena.start(n.source_id()?),
            PlanNode::Order(n) => arena.start(n.source_id()?),
            PlanNode::Limit(n) => arena.start(n.source_id()?),
            PlanNode::DagScan(n) => n.headset.map_or(Ok(()), |h| arena.start(h)),
            PlanNode::Update(n) => arena.start(n.matcher),
            PlanNode::Delete(n) => arena.start(n.matcher),
        })
    }

    /// Advance to the next document. `Ok(false)` means exhausted.
    pub fn next(&mut self, id: NodeId) -> Result<bool, PlannerError> {
        if let Some(count) = self.iterations.get_mut(id.0) {
            *count += 1;
        }
        self.with(id, |node, arena| match node {
            PlanNode::Scan(n) => n.next(),
            PlanNode::Select(n) => n.next(arena),
            PlanNode::SelectTop(n) => arena.next(n.plan()?),
            PlanNode::TypeJoin(n) => n.next(arena),
            PlanNode::Group(n) => n.next(arena),
            PlanNode::Pipe(n) => n.next(arena),
            PlanNode::MultiScan(n) => n.next(arena),
            PlanNode::Parallel(n) => n.next(arena),
            PlanNode::Aggregate(n) => n.next(arena),
            PlanNode::Order(n) => n.next(arena),
            PlanNode::Limit(n) => n.next(arena),
            PlanNode::DagScan(n) => n.next(arena),
            PlanNode::Headset(n) => n.next(),
            PlanNode::TopLevel(n) => n.next(arena),
            PlanNode::Create(n) => n.next(arena),
            PlanNode::Update(n) => n.next(arena),
            PlanNode::Delete(n) => n.next(arena),
        })
    }

    /// The current document. Only meaningful right after `next` returned true.
    pub fn value(&self, id: NodeId) -> Result<&Document, PlannerError> {
        match self.get(id)? {
            PlanNode::Scan(n) => Ok(&n.current),
            PlanNode::Select(n) => Ok(&n.current),
            PlanNode::SelectTop(n) => self.value(n.plan()?),
            PlanNode::TypeJoin(n) => Ok(&n.current),
            PlanNode::Group(n) => Ok(&n.current),
            PlanNode::Pipe(n) => Ok(&n.current),
            PlanNode::MultiScan(n) => Ok(&n.current),
            PlanNode::Parallel(n) => Ok(&n.current),
            PlanNode::Aggregate(n) => Ok(&n.current),
            PlanNode::Order(n) => Ok(&n.current),
            PlanNode::Limit(n) => Ok(&n.current),
            PlanNode::DagScan(n) => Ok(&n.current),
            PlanNode::Headset(n) => Ok(&n.current),
            PlanNode::TopLevel(n) => Ok(&n.current),
            PlanNode::Create(n) => Ok(&n.current),
            PlanNode::Update(n) => Ok(&n.current),
            PlanNode::Delete(n) => Ok(&n.current),
        }
    }

    /// Release resources of the node and everything below it. Idempotent.
    pub fn close(&mut self, id: NodeId) -> Result<(), PlannerError> {
        let mut errors = Vec::new();
        let below = self.with(id, |node, _| {
            match node {
                PlanNode::Scan(n) => n.close()?,
                PlanNode::Headset(n) => n.close(),
                PlanNode::Pipe(n) => n.reset(),
                PlanNode::Group(n) => n.reset(),
                PlanNode::Order(n) => n.reset(),
                PlanNode::Delete(n) => n.reset(),
                _ => {}
            }
            Ok(node.source().into_iter().chain(node.children()).collect::<Vec<_>>())
        });
        let below = below.unwrap_or_else(|e| {
            errors.push(e);
            Vec::new()
        });
        if let Some(cache) = self.pipe_cache(id) {
            if let Err(e) = self.close_cache(cache) {
                errors.push(e);
            }
        }
        for child in below {
            if let Err(e) = self.close(child) {
                errors.push(e);
            }
        }
        collect_errors(errors)
    }

    /// Close every node in the arena, wired or not.
    pub fn close_all(&mut self) -> Result<(), PlannerError> {
        let mut errors = Vec::new();
        for i in 0..self.nodes.len() {
            if let Err(e) = self.close(NodeId(i)) {
                errors.push(e);
            }
        }
        collect_errors(errors)
    }

    // ── Row caches ──────────────────────────────────────────

    pub(crate) fn new_cache(&mut self, source: NodeId) -> CacheId {
        self.caches.push(RowCache::new(source));
        CacheId(self.caches.len() - 1)
    }

    pub(crate) fn cache(&self, id: CacheId) -> Result<&RowCache, PlannerError> {
        self.caches.get(id.0).ok_or(PlannerError::Unwired("pipeNode"))
    }

    pub(crate) fn cache_mut(&mut self, id: CacheId) -> Result<&mut RowCache, PlannerError> {
        self.caches.get_mut(id.0).ok_or(PlannerError::Unwired("pipeNode"))
    }

    fn pipe_cache(&self, id: NodeId) -> Option<CacheId> {
        match self.get(id).ok()? {
            PlanNode::Pipe(n) => Some(n.cache),
            _ => None,
        }
    }

    fn close_cache(&mut self, id: CacheId) -> Result<(), PlannerError> {
        let cache = self.cache_mut(id)?;
        if cache.closed {
            return Ok(());
        }
        cache.closed = true;
        cache.reset();
        let source = cache.source;
        self.close(source)
    }

    // ── Surgery used while wiring and executing ─────────────

    pub(crate) fn scan_mut(&mut self, id: NodeId) -> Result<&mut ScanNode<'t>, PlannerError> {
        match self.get_mut(id)? {
            PlanNode::Scan(n) => Ok(n),
            other => Err(PlannerError::InvalidRequest(format!(
                "expected scanNode, found {}",
                other.kind().name()
            ))),
        }
    }

    /// Restrict a scan to the given documents.
    pub(crate) fn narrow_scan_to_keys(&mut self, scan: NodeId, keys: &[String]) -> Result<(), PlannerError> {
        self.scan_mut(scan)?.narrow_to_keys(keys);
        Ok(())
    }

    pub(crate) fn set_scan_filter(&mut self, scan: NodeId, filter: Option<Filter>) -> Result<(), PlannerError> {
        self.scan_mut(scan)?.filter = filter;
        Ok(())
    }

    /// Point a commit walk at the heads of another document.
    pub(crate) fn retarget_dag(&mut self, dag: NodeId, doc_key: &str) -> Result<(), PlannerError> {
        let headset = match self.get_mut(dag)? {
            PlanNode::DagScan(n) => {
                n.doc_key = Some(doc_key.to_string());
                n.headset
            }
            other => {
                return Err(PlannerError::InvalidRequest(format!(
                    "expected dagScanNode, found {}",
                    other.kind().name()
                )));
            }
        };
        if let Some(headset) = headset {
            if let PlanNode::Headset(h) = self.get_mut(headset)? {
                h.retarget(doc_key);
            }
        }
        Ok(())
    }
}

fn collect_errors(mut errors: Vec<PlannerError>) -> Result<(), PlannerError> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(PlannerError::Multiple(errors)),
    }
}

//! Параллельное чтение wideband-данных.
//!
//! Буфер назначения выделяется один раз и режется на непересекающиеся
//! куски по группам строк. Каждый поток пишет только в свой кусок и читает
//! источник по явным смещениям, поэтому блокировки не нужны, а результат не
//! зависит от числа потоков.

use std::{
    io,
    ops::{Range, RangeInclusive},
    sync::atomic::{AtomicU64, Ordering},
    thread,
};

use cphd_types::{ChannelShape, CphdError, CphdResult};
use log::{debug, trace};

use crate::{
    block::RawBlock,
    config::resolve_workers,
    locator::{ChannelLocator, ReadPlan, ReadRequest},
    source::PositionedRead,
};

/// Счётчики чтения, обновляемые lock-free из рабочих потоков.
#[derive(Debug, Default)]
pub struct WidebandStats {
    pub requests: AtomicU64,
    pub failed_requests: AtomicU64,
    pub positioned_reads: AtomicU64,
    pub bytes_read: AtomicU64,
}

/// Snapshot счётчиков для вывода / тестов.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub failed_requests: u64,
    pub positioned_reads: u64,
    pub bytes_read: u64,
}

/// Доступ к сигнальному блоку открытого файла.
pub struct Wideband<'r, S: ?Sized> {
    source: &'r S,
    locator: ChannelLocator<'r>,
    stats: &'r WidebandStats,
    default_workers: usize,
}

impl WidebandStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            positioned_reads: self.positioned_reads.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        }
    }
}

impl<'r, S: PositionedRead + ?Sized> Wideband<'r, S> {
    pub fn new(
        source: &'r S,
        locator: ChannelLocator<'r>,
        stats: &'r WidebandStats,
        default_workers: usize,
    ) -> Self {
        Self {
            source,
            locator,
            stats,
            default_workers,
        }
    }

    /// Читает подпрямоугольник канала. Блокируется до завершения всех
    /// потоков; при любой ошибке буфер отбрасывается.
    pub fn read(
        &self,
        request: &ReadRequest,
    ) -> CphdResult<RawBlock> {
        let plan = self.locator.locate(request)?;
        let workers = resolve_workers(request.workers, self.default_workers)?;

        read_block(self.source, &plan, workers, self.stats)
    }

    /// План чтения без ввода-вывода.
    pub fn locate(
        &self,
        request: &ReadRequest,
    ) -> CphdResult<ReadPlan> {
        self.locator.locate(request)
    }

    pub fn default_workers(&self) -> usize {
        self.default_workers
    }
}

/// Выполняет план: `workers` потоков, каждый со своей группой строк.
pub fn read_block<S: PositionedRead + ?Sized>(
    source: &S,
    plan: &ReadPlan,
    workers: usize,
    stats: &WidebandStats,
) -> CphdResult<RawBlock> {
    stats.requests.fetch_add(1, Ordering::Relaxed);

    let mut data = vec![0u8; plan.total_bytes()];
    let groups = plan.partition(workers);

    debug!(
        "channel {}: reading {} B in {} rows with {} worker(s)",
        plan.channel,
        data.len(),
        plan.num_rows(),
        groups.len()
    );

    let result = match groups.as_slice() {
        [rows] => read_rows(source, plan, rows.clone(), &mut data, stats),
        _ => read_parallel(source, plan, &groups, &mut data, stats),
    };

    match result {
        Ok(()) => Ok(RawBlock::new(
            data,
            plan.sample_type,
            ChannelShape::new(plan.num_rows(), plan.row_cells()),
        )),
        Err(e) => {
            stats.failed_requests.fetch_add(1, Ordering::Relaxed);
            Err(e)
        }
    }
}

fn read_parallel<S: PositionedRead + ?Sized>(
    source: &S,
    plan: &ReadPlan,
    groups: &[Range<usize>],
    dest: &mut [u8],
    stats: &WidebandStats,
) -> CphdResult<()> {
    thread::scope(|scope| {
        let mut rest = dest;

        let handles: Vec<_> = groups
            .iter()
            .enumerate()
            .map(|(i, rows)| {
                let (own, tail) =
                    std::mem::take(&mut rest).split_at_mut(rows.len() * plan.row_bytes);
                rest = tail;

                let rows = rows.clone();
                thread::Builder::new()
                    .name(format!("cphd-reader-{i}"))
                    .spawn_scoped(scope, move || read_rows(source, plan, rows, own, stats))
            })
            .collect();

        // Дожидаемся всех потоков, даже если один уже упал
        let mut first_error = None;

        for (spawned, rows) in handles.into_iter().zip(groups) {
            let joined = spawned.map(|handle| handle.join());

            if let Err(e) = group_outcome(plan, rows, joined) {
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    })
}

/// Итог группы строк. Если поток не создан или упал, группа тоже
/// считается прочитанной не полностью.
fn group_outcome(
    plan: &ReadPlan,
    rows: &Range<usize>,
    joined: io::Result<thread::Result<CphdResult<()>>>,
) -> CphdResult<()> {
    match joined {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_)) => Err(incomplete(
            plan,
            vector_span(plan, rows),
            io::Error::other("worker thread panicked"),
        )),
        Err(e) => {
            debug!("cannot spawn reader thread: {e}");
            Err(incomplete(plan, vector_span(plan, rows), e))
        }
    }
}

/// Читает группу строк `rows` плана в `dest` (кусок буфера этой группы).
fn read_rows<S: PositionedRead + ?Sized>(
    source: &S,
    plan: &ReadPlan,
    rows: Range<usize>,
    dest: &mut [u8],
    stats: &WidebandStats,
) -> CphdResult<()> {
    let span = vector_span(plan, &rows);
    let extents = &plan.rows()[rows];

    debug_assert_eq!(dest.len(), extents.len() * plan.row_bytes);
    trace!("worker: vectors {span:?}, {} B", dest.len());

    if plan.contiguous {
        // Полная ширина: группа строк занимает один непрерывный участок файла
        source
            .read_exact_at(dest, extents[0].file_offset)
            .map_err(|e| incomplete(plan, span, e))?;

        stats.positioned_reads.fetch_add(1, Ordering::Relaxed);
        stats
            .bytes_read
            .fetch_add(dest.len() as u64, Ordering::Relaxed);

        return Ok(());
    }

    for (extent, row) in extents.iter().zip(dest.chunks_exact_mut(plan.row_bytes)) {
        source
            .read_exact_at(row, extent.file_offset)
            .map_err(|e| incomplete(plan, extent.vector..=extent.vector, e))?;

        stats.positioned_reads.fetch_add(1, Ordering::Relaxed);
        stats
            .bytes_read
            .fetch_add(row.len() as u64, Ordering::Relaxed);
    }

    Ok(())
}

fn vector_span(
    plan: &ReadPlan,
    rows: &Range<usize>,
) -> RangeInclusive<usize> {
    let first = plan.vectors.start() + rows.start;
    first..=first + rows.len().saturating_sub(1)
}

fn incomplete(
    plan: &ReadPlan,
    vectors: RangeInclusive<usize>,
    source: io::Error,
) -> CphdError {
    CphdError::IncompleteRead {
        channel: plan.channel,
        vectors,
        source,
    }
}

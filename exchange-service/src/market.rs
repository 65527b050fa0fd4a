//! Multi-security container of order books.
//!
//! One [`OrderBook`] per security, created lazily from the first order that
//! names it. Lookups go through a `DashMap`; each book sits behind its own
//! mutex so both of its sides are mutated under a single lock. Books are also
//! kept in creation order for the periodic market-picture sweep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use orderbook::{
    BookError, MarketPicture, MarketPictureRecord, NewOrderRequest, Order, OrderBook, OrderId,
    OrderIdGenerator, ReplySink, RestingOrders, TranslateError,
};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info};

type SharedBook = Arc<Mutex<OrderBook>>;

/// Receives each flushed batch of market-picture records.
pub trait SnapshotSink: Send + Sync {
    fn publish(&self, picture: &MarketPicture);
}

/// Point-in-time view of one book, for queries.
#[derive(Clone, Debug, Serialize)]
pub struct BookView {
    pub is_active: bool,
    pub resting: RestingOrders,
    pub record: MarketPictureRecord,
}

pub struct Market {
    books: DashMap<String, SharedBook>,
    /// Serialises book creation; lookups never take it.
    creation: Mutex<()>,
    /// Books in creation order.
    sweep_order: RwLock<Vec<SharedBook>>,
    /// Batch carried across sweeps so sequence numbers keep counting.
    batch: Mutex<MarketPicture>,
    replies: Arc<dyn ReplySink>,
    ids: OrderIdGenerator,
    active: AtomicBool,
}

impl Market {
    pub fn new(replies: Arc<dyn ReplySink>, max_records: usize) -> Self {
        Self::with_ids(replies, max_records, OrderIdGenerator::seeded_from_clock())
    }

    pub fn with_ids(replies: Arc<dyn ReplySink>, max_records: usize, ids: OrderIdGenerator) -> Self {
        Self {
            books: DashMap::new(),
            creation: Mutex::new(()),
            sweep_order: RwLock::new(Vec::new()),
            batch: Mutex::new(MarketPicture::with_capacity(max_records)),
            replies,
            ids,
            active: AtomicBool::new(true),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Issues an order id and inserts the resulting order.
    pub fn submit(&self, req: NewOrderRequest) -> Result<OrderId, TranslateError> {
        let order = Order::new_order(self.ids.next(), req)?;
        let id = order.id;
        self.insert(order);
        Ok(id)
    }

    /// Routes a new order to its security's book, creating the book first
    /// if this is the first order seen for the security.
    pub fn insert(&self, order: Order) {
        let book = self.book_or_create(&order);
        book.lock().insert(order);
    }

    pub fn cancel(&self, req: Order) -> Result<(), BookError> {
        let book = self.book(&req.security_id)?;
        book.lock().cancel(req);
        Ok(())
    }

    pub fn replace(&self, req: Order) -> Result<(), BookError> {
        let book = self.book(&req.security_id)?;
        book.lock().replace(req);
        Ok(())
    }

    pub fn start(&self) {
        // held so no book is created between the flag flip and the walk
        let _guard = self.creation.lock();
        self.active.store(true, Ordering::Release);
        for book in self.sweep_order.read().iter() {
            book.lock().start();
        }
        info!(books = self.books.len(), "market started");
    }

    /// Halts every book, cancelling all resting and parked orders.
    pub fn stop(&self) {
        let _guard = self.creation.lock();
        self.active.store(false, Ordering::Release);
        for book in self.sweep_order.read().iter() {
            book.lock().stop();
        }
        info!(books = self.books.len(), "market stopped");
    }

    /// Known securities, sorted.
    pub fn securities(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.books.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Current picture of one security. Leaves the change flag alone, so
    /// the next sweep still publishes it.
    pub fn picture(&self, security_id: &str) -> Result<BookView, BookError> {
        let book = self.book(security_id)?;
        let book = book.lock();
        Ok(BookView {
            is_active: book.is_active(),
            resting: book.resting_orders(),
            record: book.picture(),
        })
    }

    /// Publishes the record of every book that changed since the previous
    /// sweep, newest book first, in batches of at most `max_records`.
    /// Returns the number of records published.
    pub fn sweep(&self, sink: &dyn SnapshotSink) -> usize {
        // cloned so that book creation is not held up by the sweep
        let books: Vec<SharedBook> = self.sweep_order.read().clone();
        let mut batch = self.batch.lock();
        let mut published = 0;

        for book in books.iter().rev() {
            let record = {
                let mut book = book.lock();
                if !book.has_changed() {
                    continue;
                }
                book.market_picture_record().clone()
            };
            batch.push(record);

            if batch.is_full() {
                published += flush(&mut batch, sink);
            }
        }
        if !batch.is_empty() {
            published += flush(&mut batch, sink);
        }
        published
    }

    fn book(&self, security_id: &str) -> Result<SharedBook, BookError> {
        self.books
            .get(security_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BookError::SecurityIdNotFound(security_id.to_string()))
    }

    fn book_or_create(&self, first: &Order) -> SharedBook {
        if let Ok(book) = self.book(&first.security_id) {
            return book;
        }

        let _guard = self.creation.lock();
        // another thread may have won the race
        if let Ok(book) = self.book(&first.security_id) {
            return book;
        }

        let mut book = OrderBook::new(self.replies.clone(), first);
        if !self.is_active() {
            book.stop();
        }
        let book = Arc::new(Mutex::new(book));
        self.books.insert(first.security_id.clone(), book.clone());
        self.sweep_order.write().push(book.clone());
        book
    }
}

fn flush(batch: &mut MarketPicture, sink: &dyn SnapshotSink) -> usize {
    let count = batch.len();
    debug!(sequence_no = batch.sequence_no, records = count, "publishing market picture");
    sink.publish(batch);
    batch.reset();
    count
}

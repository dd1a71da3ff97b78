use once_cell::sync::Lazy;

static THREAD_COUNT: Lazy<usize> = Lazy::new(|| {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
});

/// Deeply nested symbols recurse a lot while printing.
const STACK_SIZE: usize = 16 * 1024 * 1024;

/// Map `items` through `transformer` on all available threads, keeping the
/// order of the items.
pub fn parallel_compute<In, Out, F>(items: &[In], transformer: F) -> Vec<Out>
where
    F: Fn(&In) -> Out + Sync,
    In: Sync,
    Out: Send,
{
    let mut output = Vec::with_capacity(items.len());
    if items.is_empty() {
        return output;
    }

    let per_thread = (items.len() + (*THREAD_COUNT - 1)) / *THREAD_COUNT;
    let transformer = &transformer;

    std::thread::scope(|s| {
        let mut threads = Vec::with_capacity(*THREAD_COUNT);

        for chunk in items.chunks(per_thread) {
            let work = move || chunk.iter().map(transformer).collect::<Vec<Out>>();
            let thread = std::thread::Builder::new()
                .stack_size(STACK_SIZE)
                .spawn_scoped(s, work);

            match thread {
                Ok(thread) => threads.push(Ok(thread)),
                // out of threads, do it on this one
                Err(..) => threads.push(Err(work())),
            }
        }

        for thread in threads {
            let chunk = match thread {
                Ok(thread) => match thread.join() {
                    Ok(chunk) => chunk,
                    Err(panic) => std::panic::resume_unwind(panic),
                },
                Err(chunk) => chunk,
            };

            output.extend(chunk);
        }
    });

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_order() {
        let items: Vec<u32> = (0..1000).collect();
        let doubled = parallel_compute(&items, |x| x * 2);
        assert_eq!(doubled, items.iter().map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn empty() {
        let items: Vec<u32> = Vec::new();
        assert!(parallel_compute(&items, |x| *x).is_empty());
    }
}

#[cfg(miri)]
macro_rules! each_capacity {
  ($expr:expr) => {{
    each_capacity!(@run, $expr, 4);
    each_capacity!(@run, $expr, 100);
    each_capacity!(@run, $expr, 1 << 10);
  }};
  (@run, $expr:expr, $size:expr) => {{
    type P = $crate::params::ConstParams<{ $size }>;
    $expr
  }};
}

#[cfg(not(miri))]
macro_rules! each_capacity {
  ($expr:expr) => {{
    each_capacity!(@run, $expr, 2);
    each_capacity!(@run, $expr, 3);
    each_capacity!(@run, $expr, 4);
    each_capacity!(@run, $expr, 7);
    each_capacity!(@run, $expr, 8);
    each_capacity!(@run, $expr, 100);
    each_capacity!(@run, $expr, 1000);
    each_capacity!(@run, $expr, 1 << 10);
    each_capacity!(@run, $expr, (1 << 12) - 1);
    each_capacity!(@run, $expr, 1 << 16);
  }};
  (@run, $expr:expr, $size:expr) => {{
    type P = $crate::params::ConstParams<{ $size }>;
    $expr
  }};
}
